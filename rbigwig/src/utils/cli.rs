//! The subcommands of the `rbigwig` binary.

pub mod bigwiginfo;
pub mod intervals;
pub mod stats;

/// Opens the bigWig at `$path` (with the `remote` feature, this can be a
/// url) and calls `$f(bigwig, args...)`, where `$f` is generic over
/// `BBIFileRead`. Returns early on open errors.
macro_rules! with_bigwig {
    ($path:expr, $f:ident($($arg:expr),*)) => {{
        let path: &str = $path;
        #[cfg(feature = "remote")]
        {
            if path.starts_with("http") {
                let f = $crate::utils::file::remote_file::RemoteFile::new(path);
                let bigwig = $crate::BigWigRead::open(f)?;
                return $f(bigwig $(, $arg)*);
            }
        }
        let bigwig = $crate::BigWigRead::open_file(path)?;
        $f(bigwig $(, $arg)*)
    }};
}

pub(crate) use with_bigwig;
