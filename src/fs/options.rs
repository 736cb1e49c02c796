use crate::error::{FsError, Result};

/// Flags for [`FsService::open_file`](super::FsService::open_file), in the
/// shape of [`std::fs::OpenOptions`].
///
/// `append` and `sync` are accepted by the builder but not implemented: an
/// open requesting either fails with [`FsError::Unsupported`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) read: bool,
    pub(crate) write: bool,
    pub(crate) create: bool,
    pub(crate) create_new: bool,
    pub(crate) truncate: bool,
    pub(crate) append: bool,
    pub(crate) sync: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Create the file when the path does not resolve.
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Create the file, failing with `AlreadyExists` if anything lives at the path.
    pub fn create_new(mut self, create_new: bool) -> Self {
        self.create_new = create_new;
        self
    }

    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.append || self.sync {
            return Err(FsError::unsupported("append and sync open modes"));
        }
        if (self.create || self.create_new || self.truncate) && !self.write {
            return Err(FsError::invalid_argument(
                "create, create_new and truncate require write access",
            ));
        }
        Ok(())
    }
}
