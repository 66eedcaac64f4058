//! Block device enumeration for the wizard
//!
//! Thin lsblk wrappers used to populate the disk and partition pickers.
//! Enumeration is read-only and deliberately bypasses the dry-run gate so a
//! simulated run still previews against the machine's real layout. Parsing
//! is split out into pure functions so it can be tested against fixtures.

use crate::error::{InstallerError, Result};
use std::process::Command;

/// A whole disk as reported by `lsblk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub path: String,
    pub size: String,
    pub model: String,
}

impl Disk {
    pub fn display(&self) -> String {
        if self.model.is_empty() {
            format!("{} ({})", self.path, self.size)
        } else {
            format!("{} ({}, {})", self.path, self.size, self.model)
        }
    }
}

/// A partition on a disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub path: String,
    pub size: String,
}

impl Partition {
    pub fn display(&self) -> String {
        format!("{} ({})", self.path, self.size)
    }
}

/// List all disks on the system.
pub fn list_disks() -> Result<Vec<Disk>> {
    let stdout = lsblk(&["-p", "-dno", "NAME,SIZE,MODEL"])?;
    Ok(parse_disks(&stdout))
}

/// List the partitions of `disk`.
pub fn list_partitions(disk: &str) -> Result<Vec<Partition>> {
    let stdout = lsblk(&["-p", "-nlo", "NAME,SIZE,TYPE", disk])?;
    Ok(parse_partitions(&stdout))
}

fn lsblk(args: &[&str]) -> Result<String> {
    let output = Command::new("lsblk").args(args).output()?;
    if !output.status.success() {
        return Err(InstallerError::CommandFailed {
            command: format!("lsblk {}", args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse `lsblk -p -dno NAME,SIZE,MODEL` output.
fn parse_disks(text: &str) -> Vec<Disk> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let path = parts.next()?;
            let size = parts.next()?;
            let model = parts.collect::<Vec<_>>().join(" ");
            Some(Disk {
                path: path.to_string(),
                size: size.to_string(),
                model,
            })
        })
        .collect()
}

/// Parse `lsblk -p -nlo NAME,SIZE,TYPE` output, keeping only partitions.
fn parse_partitions(text: &str) -> Vec<Partition> {
    text.lines()
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [path, size, "part", ..] => Some(Partition {
                    path: path.to_string(),
                    size: size.to_string(),
                }),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disks_with_models() {
        let text = "/dev/vda  20G Virtio Block Device\n/dev/sda 512G Samsung SSD 870\n";
        let disks = parse_disks(text);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].path, "/dev/vda");
        assert_eq!(disks[0].size, "20G");
        assert_eq!(disks[0].model, "Virtio Block Device");
        assert_eq!(disks[1].model, "Samsung SSD 870");
    }

    #[test]
    fn test_parse_disks_without_model() {
        let disks = parse_disks("/dev/vda 20G\n");
        assert_eq!(disks.len(), 1);
        assert!(disks[0].model.is_empty());
        assert_eq!(disks[0].display(), "/dev/vda (20G)");
    }

    #[test]
    fn test_parse_disks_skips_blank_lines() {
        let disks = parse_disks("\n/dev/vda 20G Disk\n\n");
        assert_eq!(disks.len(), 1);
    }

    #[test]
    fn test_parse_partitions_filters_non_partitions() {
        let text = "/dev/vda   20G disk\n/dev/vda1   1G part\n/dev/vda2  18G part\n/dev/vda3   1G part\n";
        let parts = parse_partitions(text);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].path, "/dev/vda1");
        assert_eq!(parts[2].path, "/dev/vda3");
        assert_eq!(parts[0].display(), "/dev/vda1 (1G)");
    }

    #[test]
    fn test_parse_partitions_empty_input() {
        assert!(parse_partitions("").is_empty());
    }
}
