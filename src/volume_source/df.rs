// `df -k <mount>` output parsing (text capacity mechanism for network shares).
//
// Filesystem    1024-blocks       Used Available Capacity ... Mounted on
// //admin@beast.local/root  5809283456 642511216 5166772240    12% ... /mnt/root
//
// Long filesystem names may wrap onto their own line; the numbers then start the next one.

use crate::error::SourceError;

/// Sizes in 1024-byte blocks as reported by `df -k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfReading {
    pub total_k: u64,
    pub used_k: u64,
    pub available_k: u64,
}

impl DfReading {
    pub fn total_bytes(&self) -> u64 {
        self.total_k.saturating_mul(1024)
    }

    pub fn available_bytes(&self) -> u64 {
        self.available_k.saturating_mul(1024)
    }
}

pub fn parse_df_output(output: &str) -> Result<DfReading, SourceError> {
    let mut lines = output.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| parse_err("empty output"))?;
    if !header.trim_start().starts_with("Filesystem") {
        return Err(parse_err(format!("unexpected header: {}", header)));
    }

    // The filesystem column may contain spaces (`//nas/My Share`) or sit on its own
    // line, so anchor on the capacity column: the three integers right before `NN%`.
    let tokens: Vec<&str> = lines.flat_map(str::split_whitespace).collect();
    tokens
        .windows(4)
        .find_map(|w| {
            let total_k = w[0].parse::<u64>().ok()?;
            let used_k = w[1].parse::<u64>().ok()?;
            let available_k = w[2].parse::<u64>().ok()?;
            is_capacity(w[3]).then_some(DfReading {
                total_k,
                used_k,
                available_k,
            })
        })
        .ok_or_else(|| parse_err("missing size columns"))
}

fn is_capacity(token: &str) -> bool {
    token
        .strip_suffix('%')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_err(details: impl Into<String>) -> SourceError {
    SourceError::Parse {
        context: "df",
        details: details.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_macos_network_share() {
        let out = "Filesystem    1024-blocks       Used  Available Capacity   iused      ifree %iused  Mounted on\n\
//admin@beast.local/root  5809283456 642511216 5166772240    12% 160627802 1291693060   11%   /System/Volumes/Data/mnt/root\n";
        let r = parse_df_output(out).unwrap();
        assert_eq!(r.total_k, 5_809_283_456);
        assert_eq!(r.used_k, 642_511_216);
        assert_eq!(r.available_k, 5_166_772_240);
        assert_eq!(r.available_bytes(), 5_166_772_240 * 1024);
    }

    #[test]
    fn parses_local_disk_line() {
        let out = "Filesystem    1024-blocks       Used Available Capacity iused      ifree %iused  Mounted on\n\
/dev/disk14s2  3906870272 3582336656 324533616    92%   97180 4294870099    0%   /Volumes/op\n";
        let r = parse_df_output(out).unwrap();
        assert_eq!(r.total_k, 3_906_870_272);
        assert_eq!(r.available_k, 324_533_616);
    }

    #[test]
    fn parses_wrapped_filesystem_column() {
        let out = "Filesystem     1K-blocks      Used Available Use% Mounted on\n\
//fileserver.example.internal/very/long/share/name\n\
                1000000    400000    600000  40% /mnt/share\n";
        let r = parse_df_output(out).unwrap();
        assert_eq!(
            r,
            DfReading {
                total_k: 1_000_000,
                used_k: 400_000,
                available_k: 600_000
            }
        );
    }

    #[test]
    fn parses_share_name_with_spaces() {
        let out = "Filesystem 1K-blocks Used Available Use% Mounted on\n\
//nas/My Share   1000000 400000 600000 40% /mnt/share\n";
        let r = parse_df_output(out).unwrap();
        assert_eq!(r.total_k, 1_000_000);
        assert_eq!(r.used_k, 400_000);
        assert_eq!(r.available_k, 600_000);
    }

    #[test]
    fn numeric_words_in_share_name_are_skipped() {
        let out = "Filesystem 1K-blocks Used Available Use% Mounted on\n\
//nas/Backup 2024 500 2000000 1500000 500000 75% /mnt/backup\n";
        let r = parse_df_output(out).unwrap();
        assert_eq!(r.total_k, 2_000_000);
        assert_eq!(r.available_k, 500_000);
    }

    #[test]
    fn rejects_missing_data_line() {
        let out = "Filesystem 1024-blocks Used Available Capacity Mounted on\n";
        assert!(parse_df_output(out).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_df_output("").is_err());
        assert!(parse_df_output("df: /nope: No such file or directory\n").is_err());
    }
}
