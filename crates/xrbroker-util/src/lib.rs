//! Small error-handling helpers shared by the broker's binary and its
//! library crates. Generalized from a game server's `crucible-util` lang
//! module: an `anyhow` adapter for `std::error::Error`, and a `MultiError`
//! for aggregating independent startup failures.

use std::{error::Error, fmt, future::Future, mem, path::Path};

use anyhow::Context;

// === AnyhowAsyncExt === //

pub trait AnyhowAsyncExt: Sized {
    type Ok;
    type Err: 'static + Send + Sync + Error;

    fn into_result(self) -> Result<Self::Ok, Self::Err>;

    fn with_context_async<F, Fut>(self, f: F) -> impl Future<Output = anyhow::Result<Self::Ok>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = String>,
    {
        async {
            match self.into_result() {
                Ok(v) => Ok(v),
                Err(e) => Err(anyhow::Error::new(e).context(f().await)),
            }
        }
    }
}

impl<T, E: 'static + Send + Sync + Error> AnyhowAsyncExt for Result<T, E> {
    type Ok = T;
    type Err = E;

    fn into_result(self) -> Result<T, E> {
        self
    }
}

// === Anyhow Std Adapter === //

/// Wraps an `anyhow::Error` so it can be handed to APIs that want a
/// `std::error::Error`, without cloning the underlying error chain.
#[repr(transparent)]
pub struct AnyhowStdAdapter(pub anyhow::Error);

impl AnyhowStdAdapter {
    pub fn wrap_ref(v: &anyhow::Error) -> &Self {
        unsafe { std::mem::transmute(v) }
    }
}

impl fmt::Debug for AnyhowStdAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for AnyhowStdAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for AnyhowStdAdapter {}

// === MultiError === //

/// Aggregates independent fatal errors encountered while doing several
/// unrelated things (e.g. binding a socket *and* mapping shared memory at
/// startup) so the operator sees all of them instead of only the first.
#[derive(Debug)]
pub struct MultiError {
    name: String,
    errors: Vec<anyhow::Error>,
}

impl Error for MultiError {}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to complete {:?} because of {} fatal error{}",
            self.name,
            self.errors.len(),
            if self.errors.len() == 1 { "" } else { "s" }
        )
    }
}

impl MultiError {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            errors: Vec::new(),
        }
    }

    #[track_caller]
    pub fn report(&mut self, error: anyhow::Error) {
        log::error!("error occurred during {:?}:\n{error:?}", self.name);
        self.errors.push(error);
    }

    pub fn maybe_report<T>(&mut self, res: anyhow::Result<T>) -> Option<T> {
        match res {
            Ok(val) => Some(val),
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    pub fn finish(self) -> anyhow::Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow::Error::new(self))
        }
    }

    pub fn reset(&mut self, name: impl Into<String>) -> anyhow::Result<()> {
        mem::replace(self, Self::new(name)).finish()
    }
}

// === scope_err === //

pub fn scope_err<T>(f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    f()
}

// === FS helpers === //

pub async fn tokio_read_file_anyhow(what: &str, path: impl AsRef<Path>) -> anyhow::Result<Vec<u8>> {
    let path = path.as_ref();
    tokio::fs::read(path).await.with_context(|| {
        format!(
            "failed to read {what} (path: {:?})",
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf()),
        )
    })
}
