//! Filesystem and device identification, and cache flushing.
//!
//! These are best-effort helpers: every lookup degrades to `"unknown"` rather
//! than failing the benchmark.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const UNKNOWN: &str = "unknown";

/// Filesystem types whose contents live in RAM.
const RAM_FILESYSTEMS: &[&str] = &["tmpfs", "ramfs", "devtmpfs"];

/// Device identity for a benchmark target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub device_name: String,
    pub vendor: String,
    pub product: String,
    pub serial: String,
    pub firmware: String,
}

impl Default for HardwareInfo {
    fn default() -> Self {
        Self {
            device_name: UNKNOWN.to_string(),
            vendor: UNKNOWN.to_string(),
            product: UNKNOWN.to_string(),
            serial: UNKNOWN.to_string(),
            firmware: UNKNOWN.to_string(),
        }
    }
}

/// Probes the host for information about a benchmark target.
pub trait DeviceProbe: Send + Sync {
    /// Filesystem type name (e.g. "ext4", "apfs", "tmpfs").
    fn filesystem_name(&self, path: &Path) -> String;

    /// Human-readable volume name (usually the mount point's last component).
    fn volume_name(&self, path: &Path) -> String;

    /// Identity of the block device backing `path`.
    fn hardware_info(&self, path: &Path) -> HardwareInfo;

    /// Flush dirty data and drop cached pages for the device holding `path`.
    fn flush_cache(&self, path: &Path) -> Result<()>;
}

/// Whether a filesystem type is RAM-backed.
pub fn is_ram_filesystem(fs_name: &str) -> bool {
    RAM_FILESYSTEMS.contains(&fs_name.to_lowercase().as_str())
}

/// A row of the system mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fstype: String,
}

/// Parse `/proc/mounts`-formatted text.
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return None;
            }
            Some(MountEntry {
                device: parts[0].to_string(),
                mount_point: PathBuf::from(unescape_mount_field(parts[1])),
                fstype: parts[2].to_string(),
            })
        })
        .collect()
}

/// `/proc/mounts` escapes whitespace in paths as octal (`\040`).
fn unescape_mount_field(field: &str) -> String {
    field
        .replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}

/// Find the mount entry with the longest mount point containing `path`.
pub fn find_mount<'a>(entries: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    entries
        .iter()
        .filter(|e| path.starts_with(&e.mount_point))
        .max_by_key(|e| e.mount_point.components().count())
}

/// Probe backed by the running system (`/proc` and `/sys` on Linux).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl SystemProbe {
    fn mount_for(path: &Path) -> Option<MountEntry> {
        let canonical = path.canonicalize().ok()?;
        let table = std::fs::read_to_string("/proc/mounts").ok()?;
        let entries = parse_mount_table(&table);
        find_mount(&entries, &canonical).cloned()
    }

    fn read_sys_attr(dir: &Path, name: &str) -> Option<String> {
        let value = std::fs::read_to_string(dir.join(name)).ok()?;
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    /// Resolve a partition (`nvme0n1p2`) to its whole-disk sysfs directory.
    fn disk_sysfs_dir(block_name: &str) -> Option<PathBuf> {
        let dir = Path::new("/sys/class/block").join(block_name).canonicalize().ok()?;
        if dir.join("partition").exists() {
            dir.parent().map(Path::to_path_buf)
        } else {
            Some(dir)
        }
    }
}

impl DeviceProbe for SystemProbe {
    fn filesystem_name(&self, path: &Path) -> String {
        Self::mount_for(path).map_or_else(|| UNKNOWN.to_string(), |m| m.fstype)
    }

    fn volume_name(&self, path: &Path) -> String {
        match Self::mount_for(path) {
            Some(m) => m
                .mount_point
                .file_name()
                .map_or_else(|| m.mount_point.display().to_string(), |n| n.to_string_lossy().to_string()),
            None => path.display().to_string(),
        }
    }

    fn hardware_info(&self, path: &Path) -> HardwareInfo {
        let Some(mount) = Self::mount_for(path) else {
            return HardwareInfo::default();
        };
        let Some(block_name) = mount.device.strip_prefix("/dev/") else {
            // Virtual filesystems have no backing device.
            return HardwareInfo {
                device_name: mount.device,
                ..HardwareInfo::default()
            };
        };

        let mut info = HardwareInfo {
            device_name: block_name.to_string(),
            ..HardwareInfo::default()
        };
        let Some(disk_dir) = Self::disk_sysfs_dir(block_name) else {
            return info;
        };
        if let Some(name) = disk_dir.file_name() {
            info.device_name = name.to_string_lossy().to_string();
        }

        let device_dir = disk_dir.join("device");
        if let Some(v) = Self::read_sys_attr(&device_dir, "vendor") {
            info.vendor = v;
        }
        if let Some(v) = Self::read_sys_attr(&device_dir, "model") {
            info.product = v;
        }
        if let Some(v) = Self::read_sys_attr(&device_dir, "serial") {
            info.serial = v;
        }
        if let Some(v) = Self::read_sys_attr(&device_dir, "firmware_rev")
            .or_else(|| Self::read_sys_attr(&device_dir, "rev"))
        {
            info.firmware = v;
        }
        info
    }

    fn flush_cache(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "Flushing disk cache");
        flush_platform_cache()
    }
}

#[cfg(unix)]
fn run_sync() -> Result<()> {
    let status = std::process::Command::new("sync")
        .status()
        .context("Failed to run sync")?;
    if !status.success() {
        bail!("sync exited with {status}");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn flush_platform_cache() -> Result<()> {
    run_sync()?;
    std::fs::write("/proc/sys/vm/drop_caches", "3\n")
        .context("Failed to drop page cache (requires root)")
}

#[cfg(target_os = "macos")]
fn flush_platform_cache() -> Result<()> {
    run_sync()?;
    let status = std::process::Command::new("purge")
        .status()
        .context("Failed to run purge")?;
    if !status.success() {
        bail!("purge exited with {status}");
    }
    Ok(())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn flush_platform_cache() -> Result<()> {
    bail!("Cache flushing is not supported on this platform")
}
