//! Build-script helpers for rendering the `drover` manual page.
//!
//! The functions take their inputs explicitly (epoch string, target triple,
//! profile, `OUT_DIR`) so build scripts read the environment once and tests can
//! exercise every branch without mutating process state.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use time::{OffsetDateTime, format_description::well_known::Iso8601};

/// Date stamped on manual pages when no usable `SOURCE_DATE_EPOCH` exists.
pub const FALLBACK_DATE: &str = "1970-01-01";

/// Formats `epoch` (seconds since the Unix epoch) as an ISO 8601 date.
///
/// Invalid input falls back to [`FALLBACK_DATE`] and records a warning without
/// the `cargo:warning=` prefix so callers decide how to surface it. A missing
/// epoch falls back silently.
///
/// ```
/// let mut warnings = Vec::new();
/// assert_eq!(drover_build_util::manual_date(Some("86400"), &mut warnings), "1970-01-02");
/// assert!(warnings.is_empty());
/// ```
pub fn manual_date(epoch: Option<&str>, warnings: &mut Vec<String>) -> String {
    let Some(raw) = epoch else {
        return FALLBACK_DATE.into();
    };
    let Ok(seconds) = raw.trim().parse::<i64>() else {
        warnings.push(format!(
            "Invalid SOURCE_DATE_EPOCH '{raw}'; expected integer seconds since Unix epoch; \
             falling back to {FALLBACK_DATE}"
        ));
        return FALLBACK_DATE.into();
    };
    let Ok(moment) = OffsetDateTime::from_unix_timestamp(seconds) else {
        warnings.push(format!(
            "Invalid SOURCE_DATE_EPOCH '{raw}'; not a valid Unix timestamp; falling back to \
             {FALLBACK_DATE}"
        ));
        return FALLBACK_DATE.into();
    };
    moment.format(&Iso8601::DATE).unwrap_or_else(|_| {
        warnings.push(format!(
            "Invalid SOURCE_DATE_EPOCH '{raw}'; formatting failed; falling back to {FALLBACK_DATE}"
        ));
        FALLBACK_DATE.into()
    })
}

/// Reads `SOURCE_DATE_EPOCH` and delegates to [`manual_date`].
pub fn manual_date_from_env(warnings: &mut Vec<String>) -> String {
    let epoch = env::var("SOURCE_DATE_EPOCH").ok();
    manual_date(epoch.as_deref(), warnings)
}

/// Finds the nearest ancestor of `out_dir` named `target`.
///
/// Cargo places `OUT_DIR` at `target/<profile>/build/<crate>-<hash>/out`, or
/// under `target/<triple>/...` when cross-compiling.
#[must_use]
pub fn workspace_target_dir(out_dir: &Path) -> Option<PathBuf> {
    out_dir
        .ancestors()
        .find(|candidate| candidate.file_name().and_then(|name| name.to_str()) == Some("target"))
        .map(Path::to_path_buf)
}

/// Directory receiving generated manual pages for `target` and `profile`.
///
/// Pages land in `<workspace target>/generated-man/<target>/<profile>`; a
/// relative `target` directory is used when `out_dir` is absent or does not
/// sit below one.
#[must_use]
pub fn out_dir_for_target_profile(target: &str, profile: &str, out_dir: Option<&Path>) -> PathBuf {
    out_dir
        .and_then(workspace_target_dir)
        .unwrap_or_else(|| PathBuf::from("target"))
        .join("generated-man")
        .join(target)
        .join(profile)
}

/// Writes `data` to `dir/page_name`, replacing any previous page atomically.
///
/// # Errors
///
/// Returns any IO error raised while creating the directory or writing and
/// renaming the staged file.
pub fn write_man_page(data: &[u8], dir: &Path, page_name: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let destination = dir.join(page_name);
    let staged = dir.join(format!("{page_name}.tmp"));
    fs::write(&staged, data)?;
    fs::rename(&staged, &destination)?;
    Ok(destination)
}
