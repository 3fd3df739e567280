//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Formats the permission bits of a unix mode as an `ls`-style string.
///
/// ## Examples
///
/// ```
/// use monosnap::utils::format_mode;
///
/// assert_eq!(format_mode(0o755), "rwxr-xr-x");
/// assert_eq!(format_mode(0o200), "-w-------");
/// assert_eq!(format_mode(0o100644), "rw-r--r--");
/// ```
pub fn format_mode(mode: u32) -> String {
    const BITS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];

    BITS.iter()
        .map(|&(bit, c)| if mode & bit != 0 { c } else { '-' })
        .collect()
}

/// Formats a byte count using decimal units, truncating towards zero.
///
/// ## Examples
///
/// ```
/// use monosnap::utils::human_size;
///
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(10_485_760), "10 MB");
/// assert_eq!(human_size(3_000_000_000), "3 GB");
/// ```
pub fn human_size(size: u64) -> String {
    match size {
        s if s >= 1_000_000_000 => format!("{} GB", s / 1_000_000_000),
        s if s >= 1_000_000 => format!("{} MB", s / 1_000_000),
        s if s >= 1_000 => format!("{} KB", s / 1_000),
        s => format!("{} B", s),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
