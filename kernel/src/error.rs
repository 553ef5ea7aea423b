//! Crate-wide error taxonomy
//!
//! `KernelError` is the single error type returned across subsystem
//! boundaries. A `BadUserPointer` that reaches the syscall bridge's
//! `dispatch` terminates the calling process rather than propagating
//! further up. This type covers filesystem failures, resource lookups,
//! and memory subsystem errors that a caller can reasonably inspect and
//! react to.

use core::fmt;

/// Filesystem-level errors, narrower than `KernelError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    AlreadyExists,
    PermissionDenied,
    NotADirectory,
    NotAFile,
    IsADirectory,
    ReadOnly,
    InvalidPath,
    NoRootFs,
    IoError,
    DirectoryNotEmpty,
    TooManyOpenFiles,
    BadFileDescriptor,
    NotSupported,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FsError::NotFound => "no such file or directory",
            FsError::AlreadyExists => "file already exists",
            FsError::PermissionDenied => "permission denied",
            FsError::NotADirectory => "not a directory",
            FsError::NotAFile => "not a file",
            FsError::IsADirectory => "is a directory",
            FsError::ReadOnly => "filesystem is read-only",
            FsError::InvalidPath => "invalid path",
            FsError::NoRootFs => "no root filesystem mounted",
            FsError::IoError => "I/O error",
            FsError::DirectoryNotEmpty => "directory not empty",
            FsError::TooManyOpenFiles => "too many open files",
            FsError::BadFileDescriptor => "bad file descriptor",
            FsError::NotSupported => "operation not supported",
        };
        write!(f, "{}", s)
    }
}

impl From<&'static str> for FsError {
    fn from(_: &'static str) -> Self {
        FsError::IoError
    }
}

/// Crate-wide error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    OutOfMemory,
    SwapExhausted,
    InvalidAddress { addr: usize },
    UnmappedMemory { addr: usize },
    BadUserPointer { addr: usize },
    PermissionDenied,
    ProcessNotFound { pid: u64 },
    NotFound { resource: &'static str, id: u64 },
    AlreadyExists { resource: &'static str, id: u64 },
    InvalidArgument,
    ResourceExhausted { resource: &'static str },
    NotInitialized { subsystem: &'static str },
    Fs(FsError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::OutOfMemory => write!(f, "out of memory"),
            KernelError::SwapExhausted => write!(f, "swap space exhausted"),
            KernelError::InvalidAddress { addr } => write!(f, "invalid address {:#x}", addr),
            KernelError::UnmappedMemory { addr } => write!(f, "unmapped memory at {:#x}", addr),
            KernelError::BadUserPointer { addr } => write!(f, "bad user pointer {:#x}", addr),
            KernelError::PermissionDenied => write!(f, "permission denied"),
            KernelError::ProcessNotFound { pid } => write!(f, "process {} not found", pid),
            KernelError::NotFound { resource, id } => write!(f, "{} {} not found", resource, id),
            KernelError::AlreadyExists { resource, id } => {
                write!(f, "{} {} already exists", resource, id)
            }
            KernelError::InvalidArgument => write!(f, "invalid argument"),
            KernelError::ResourceExhausted { resource } => write!(f, "{} exhausted", resource),
            KernelError::NotInitialized { subsystem } => {
                write!(f, "{} not initialized", subsystem)
            }
            KernelError::Fs(e) => write!(f, "filesystem error: {}", e),
        }
    }
}

impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        KernelError::Fs(e)
    }
}

impl From<&'static str> for KernelError {
    fn from(s: &'static str) -> Self {
        KernelError::Fs(FsError::from(s))
    }
}
