// Network share discovery from `mount` output.
//
// BSD / macOS:
//   //admin@beast.local/root on /System/Volumes/Data/mnt/root (afpfs, nodev, nosuid, automounted, nobrowse, mounted by brian)
//   nas.local:/export/media on /Volumes/media (nfs, asynchronous)
// Linux:
//   //nas/share on /mnt/share type cifs (rw,relatime,vers=3.1.1,username=bob,...)
//   nas:/export on /mnt/nfs type nfs4 (rw,relatime,...)

use crate::models::NetworkVolume;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

const NETWORK_FS_TYPES: &[&str] = &[
    "smbfs", "afpfs", "nfs", "nfs4", "cifs", "smb3", "webdav", "fuse.sshfs",
];

static BSD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<source>\S+)\s+on\s+(?P<mount>.+?)\s+\((?P<fstype>[\w.]+)(?:,\s*(?P<opts>[^)]*))?\)\s*$")
        .expect("valid BSD mount regex")
});

static LINUX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<source>\S+)\s+on\s+(?P<mount>.+?)\s+type\s+(?P<fstype>\S+)\s+\((?P<opts>[^)]*)\)\s*$")
        .expect("valid Linux mount regex")
});

/// `//[user@]host[/path]`
static SMB_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^//(?:(?P<user>[^@/]+)@)?(?P<host>[^/]+)(?P<path>/.*)?$")
        .expect("valid share source regex")
});

/// `[user@]host:/path`
static NFS_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<user>[^@:/]+)@)?(?P<host>[^:/]+):(?P<path>/.*)?$")
        .expect("valid export source regex")
});

pub fn is_network_fs_type(fs_type: &str) -> bool {
    NETWORK_FS_TYPES.contains(&fs_type)
}

/// Parses every network share line out of a `mount` listing.
pub fn parse_mount_output(output: &str) -> Vec<NetworkVolume> {
    let mut out: Vec<NetworkVolume> = Vec::new();
    for volume in output.lines().filter_map(parse_mount_line) {
        if !out.contains(&volume) {
            out.push(volume);
        }
    }
    out.sort();
    out
}

/// Parses one `mount` line; None for local file systems and unrecognised lines.
pub fn parse_mount_line(line: &str) -> Option<NetworkVolume> {
    let line = line.trim();
    let caps = LINUX_LINE
        .captures(line)
        .or_else(|| BSD_LINE.captures(line))?;
    let fs_type = caps.name("fstype")?.as_str();
    if !is_network_fs_type(fs_type) {
        return None;
    }
    let source = caps.name("source")?.as_str();
    let mount = caps.name("mount")?.as_str();
    let opts = caps.name("opts").map(|m| m.as_str()).unwrap_or("");

    let src = SMB_SOURCE
        .captures(source)
        .or_else(|| NFS_SOURCE.captures(source))?;
    let user_from_source = src.name("user").map(|m| m.as_str().to_string());
    let username = user_from_source
        .or_else(|| option_value(opts, &["username", "user"]))
        .unwrap_or_default();

    Some(NetworkVolume {
        username,
        remote_host: src.name("host")?.as_str().to_string(),
        remote_path: src.name("path").map(|m| m.as_str()).unwrap_or("").to_string(),
        local_mount: PathBuf::from(mount),
        share_type: fs_type.to_string(),
    })
}

fn option_value(opts: &str, names: &[&str]) -> Option<String> {
    opts.split(',').map(str::trim).find_map(|opt| {
        let (k, v) = opt.split_once('=')?;
        names.contains(&k).then(|| v.to_string())
    })
}
