// rust/lattice-io/src/volume.rs

//! Volume formats and who does I/O under each.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};
use crate::layout::LatticeLayout;

/// Physical file layout of a lattice file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeFormat {
    /// One file shared by all nodes.
    SingleFile,
    /// One file per node, each in that node's storage order.
    MultiFile,
    /// One file per I/O partition.
    PartFile,
}

impl VolumeFormat {
    /// Code stored in the private file XML.
    pub fn code(self) -> i32 {
        match self {
            VolumeFormat::SingleFile => 0,
            VolumeFormat::MultiFile => 1,
            VolumeFormat::PartFile => 2,
        }
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(VolumeFormat::SingleFile),
            1 => Ok(VolumeFormat::MultiFile),
            2 => Ok(VolumeFormat::PartFile),
            _ => Err(LatticeError::BadVolumeFormat { code }),
        }
    }

    /// Whether files of this format carry a sitelist record.
    pub fn has_sitelist(self) -> bool {
        !matches!(self, VolumeFormat::SingleFile)
    }
}

impl TryFrom<i32> for VolumeFormat {
    type Error = LatticeError;

    fn try_from(code: i32) -> Result<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for VolumeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VolumeFormat::SingleFile => "SINGLEFILE",
            VolumeFormat::MultiFile => "MULTIFILE",
            VolumeFormat::PartFile => "PARTFILE",
        };
        f.write_str(name)
    }
}

/// How a shared file is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoMode {
    /// One node moves every site in file order.
    #[default]
    Serial,
    /// Every I/O node seeks to its own sites.
    Parallel,
}

/// Name of the physical file that `node` reads or writes.
///
/// SINGLEFILE uses `base` unchanged; other formats append `.volNNNN`.
pub fn volume_path(base: &Path, volfmt: VolumeFormat, node: usize) -> PathBuf {
    match volfmt {
        VolumeFormat::SingleFile => base.to_path_buf(),
        _ => suffixed(base, node),
    }
}

/// `base` with the `.volNNNN` suffix of `node`.
pub fn suffixed(base: &Path, node: usize) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".vol{node:04}"));
    PathBuf::from(name)
}

/// One node's part in moving a field record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    /// The node doing I/O on behalf of this node.
    pub io_node: usize,
    /// Whether this node reads or writes a physical file.
    pub holds_file: bool,
}

/// Works out which node serves `node`, and whether `node` holds a file.
pub fn role(
    layout: &dyn LatticeLayout,
    volfmt: VolumeFormat,
    mode: IoMode,
    node: usize,
) -> Role {
    match (volfmt, mode) {
        (VolumeFormat::SingleFile, IoMode::Serial) => {
            let master = layout.master_io_node();
            Role {
                io_node: master,
                holds_file: node == master,
            }
        }
        (VolumeFormat::SingleFile, IoMode::Parallel) | (VolumeFormat::PartFile, _) => {
            let io_node = layout.io_node(node);
            Role {
                io_node,
                holds_file: node == io_node,
            }
        }
        (VolumeFormat::MultiFile, _) => Role {
            io_node: node,
            holds_file: true,
        },
    }
}

/// Nodes holding a physical file, in ascending order.
pub fn file_holders(layout: &dyn LatticeLayout, volfmt: VolumeFormat, mode: IoMode) -> Vec<usize> {
    (0..layout.number_of_nodes())
        .filter(|&n| role(layout, volfmt, mode, n).holds_file)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::BlockLayout;

    #[test]
    fn test_codes_round_trip() {
        for volfmt in [
            VolumeFormat::SingleFile,
            VolumeFormat::MultiFile,
            VolumeFormat::PartFile,
        ] {
            assert_eq!(VolumeFormat::from_code(volfmt.code()).unwrap(), volfmt);
        }
        assert!(matches!(
            VolumeFormat::try_from(7),
            Err(LatticeError::BadVolumeFormat { code: 7 })
        ));
    }

    #[test]
    fn test_volume_path() {
        let base = Path::new("cfg/lat.lime");
        assert_eq!(
            volume_path(base, VolumeFormat::SingleFile, 3),
            PathBuf::from("cfg/lat.lime")
        );
        assert_eq!(
            volume_path(base, VolumeFormat::PartFile, 3),
            PathBuf::from("cfg/lat.lime.vol0003")
        );
        assert_eq!(
            volume_path(base, VolumeFormat::MultiFile, 12),
            PathBuf::from("cfg/lat.lime.vol0012")
        );
    }

    #[test]
    fn test_file_holders() {
        let layout = BlockLayout::new(vec![4, 4], vec![2, 2], 2, 0).unwrap();
        assert_eq!(
            file_holders(&layout, VolumeFormat::SingleFile, IoMode::Serial),
            vec![0]
        );
        assert_eq!(
            file_holders(&layout, VolumeFormat::SingleFile, IoMode::Parallel),
            vec![0, 2]
        );
        assert_eq!(
            file_holders(&layout, VolumeFormat::PartFile, IoMode::Serial),
            vec![0, 2]
        );
        assert_eq!(
            file_holders(&layout, VolumeFormat::MultiFile, IoMode::Serial),
            vec![0, 1, 2, 3]
        );
        assert_eq!(
            role(&layout, VolumeFormat::PartFile, IoMode::Serial, 3),
            Role {
                io_node: 2,
                holds_file: false
            }
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(VolumeFormat::PartFile.to_string(), "PARTFILE");
        assert!(VolumeFormat::MultiFile.has_sitelist());
        assert!(!VolumeFormat::SingleFile.has_sitelist());
    }
}
