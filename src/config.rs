//! Mount-time configuration (ambient; grounded in the original's `params_t`
//! from `fs.c`'s `fat32_fs_open(path, params, ...)`).

/// Sizing knobs for the tables a [`crate::filesystem::Filesystem`] builds
/// at mount time. Everything else the original's `params_t` carried
/// (verbose, log path, foreground) belongs to the excluded kernel-callback
/// shim, not this crate.
#[derive(Debug, Clone, Copy)]
pub struct MountParams {
    /// Expected number of concurrently open files; sizes the path→record
    /// table's initial capacity.
    pub open_file_table_size: usize,
    /// Expected number of live handles; sizes the handle→object table's
    /// initial capacity.
    pub handle_table_size: usize,
}

impl Default for MountParams {
    fn default() -> Self {
        MountParams {
            open_file_table_size: 64,
            handle_table_size: 64,
        }
    }
}
