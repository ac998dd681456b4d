//! Owned file descriptors and the calls that create, duplicate, read and close them.

use std::{
    ffi::{c_int, CString, OsStr},
    io,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, RawFd},
        unix::prelude::OsStrExt,
    },
};

use crate::{common::OsError, cutils::cerr, log::dev_warn};

/// An open file descriptor owned by this value.
///
/// The descriptor is closed exactly once: either by [`FileDescriptor::close`], which reports
/// failures, or when the value is dropped. Use [`IntoRawFd::into_raw_fd`] to deliberately leak it,
/// for example so that it stays open across an `exec`.
#[derive(Debug, PartialEq, Eq)]
pub struct FileDescriptor {
    fd: RawFd,
}

impl FileDescriptor {
    /// Close the descriptor and report whether the OS could close it.
    pub fn close(self) -> Result<(), OsError> {
        let fd = self.into_raw_fd();
        cerr("close", unsafe { libc::close(fd) }).map(|_| ())
    }

    /// Read into `buf`, returning the number of bytes read. `0` means end of stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, OsError> {
        read(self.fd, buf)
    }

    /// Write from `buf`, returning the number of bytes written.
    pub fn write(&self, buf: &[u8]) -> Result<usize, OsError> {
        write(self.fd, buf)
    }

    /// Duplicate this descriptor onto `target`, closing whatever `target` referred to before.
    pub fn dup_onto(&self, target: RawFd) -> Result<(), OsError> {
        dup2(self.fd, target)
    }

    /// Make the descriptor close automatically when the process calls `exec`.
    pub fn set_cloexec(&self) -> Result<(), OsError> {
        let flags = cerr("fcntl", unsafe { libc::fcntl(self.fd, libc::F_GETFD) })?;
        cerr("fcntl", unsafe {
            libc::fcntl(self.fd, libc::F_SETFD, flags | libc::FD_CLOEXEC)
        })?;
        Ok(())
    }
}

impl Drop for FileDescriptor {
    fn drop(&mut self) {
        if let Err(err) = cerr("close", unsafe { libc::close(self.fd) }) {
            dev_warn!("cannot close file descriptor {}: {err}", self.fd);
        }
    }
}

impl AsRawFd for FileDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for &FileDescriptor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl AsFd for FileDescriptor {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: `self.fd` stays open for as long as `self` is borrowed.
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }
}

impl IntoRawFd for FileDescriptor {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        std::mem::forget(self);
        fd
    }
}

impl FromRawFd for FileDescriptor {
    /// # Safety
    ///
    /// `fd` must be open and not owned by anything else.
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl io::Read for &FileDescriptor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        FileDescriptor::read(self, buf).map_err(Into::into)
    }
}

impl io::Write for &FileDescriptor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        FileDescriptor::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Flags to configure how [`open`] opens a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    flags: c_int,
}

impl OpenFlags {
    pub const fn read_only() -> Self {
        Self {
            flags: libc::O_RDONLY,
        }
    }

    pub const fn write_only() -> Self {
        Self {
            flags: libc::O_WRONLY,
        }
    }

    pub const fn read_write() -> Self {
        Self {
            flags: libc::O_RDWR,
        }
    }

    /// Use raw `open` flags, as handed over by a host binding.
    pub const fn from_bits(flags: c_int) -> Self {
        Self { flags }
    }

    pub const fn append(mut self) -> Self {
        self.flags |= libc::O_APPEND;
        self
    }

    pub const fn create(mut self) -> Self {
        self.flags |= libc::O_CREAT;
        self
    }

    pub const fn truncate(mut self) -> Self {
        self.flags |= libc::O_TRUNC;
        self
    }

    /// Close the descriptor automatically when the process calls `exec`.
    pub const fn close_on_exec(mut self) -> Self {
        self.flags |= libc::O_CLOEXEC;
        self
    }

    pub const fn bits(&self) -> c_int {
        self.flags
    }
}

/// Permission bits for files created by [`open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    bits: libc::mode_t,
}

impl Mode {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    pub const fn from_bits(bits: libc::mode_t) -> Self {
        Self { bits }
    }

    pub const fn user_read(mut self) -> Self {
        self.bits |= libc::S_IRUSR;
        self
    }

    pub const fn user_write(mut self) -> Self {
        self.bits |= libc::S_IWUSR;
        self
    }

    pub const fn group_read(mut self) -> Self {
        self.bits |= libc::S_IRGRP;
        self
    }

    pub const fn bits(&self) -> libc::mode_t {
        self.bits
    }
}

/// Open the file at `path`.
///
/// A path containing a NUL byte is rejected with `EINVAL`.
pub fn open(
    path: impl AsRef<OsStr>,
    flags: OpenFlags,
    mode: Mode,
) -> Result<FileDescriptor, OsError> {
    let path = CString::new(path.as_ref().as_bytes())
        .map_err(|_| OsError::new("open", libc::EINVAL))?;

    let fd = cerr("open", unsafe {
        libc::open(path.as_ptr(), flags.bits(), libc::c_uint::from(mode.bits()))
    })?;

    Ok(FileDescriptor { fd })
}

/// Create a pipe, returning its read end and its write end, in that order.
pub fn pipe() -> Result<(FileDescriptor, FileDescriptor), OsError> {
    let mut fds: [c_int; 2] = [-1; 2];
    cerr("pipe", unsafe { libc::pipe(fds.as_mut_ptr()) })?;

    Ok((FileDescriptor { fd: fds[0] }, FileDescriptor { fd: fds[1] }))
}

/// Like [`pipe`] but both ends are closed when the process calls `exec`.
pub(crate) fn pipe_cloexec() -> Result<(FileDescriptor, FileDescriptor), OsError> {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    {
        let mut fds: [c_int; 2] = [-1; 2];
        cerr("pipe", unsafe {
            libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC)
        })?;

        Ok((FileDescriptor { fd: fds[0] }, FileDescriptor { fd: fds[1] }))
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    {
        let (rx, tx) = pipe()?;
        rx.set_cloexec()?;
        tx.set_cloexec()?;
        Ok((rx, tx))
    }
}

/// Make `new` refer to the same open file as `old`.
pub fn dup2(old: RawFd, new: RawFd) -> Result<(), OsError> {
    cerr("dup2", unsafe { libc::dup2(old, new) }).map(|_| ())
}

/// Read from a descriptor that is not owned by a [`FileDescriptor`], such as `STDIN_FILENO`.
pub fn read(fd: RawFd, buf: &mut [u8]) -> Result<usize, OsError> {
    let n = cerr("read", unsafe {
        libc::read(fd, buf.as_mut_ptr().cast(), buf.len())
    })?;
    Ok(n as usize)
}

/// Write to a descriptor that is not owned by a [`FileDescriptor`], such as `STDOUT_FILENO`.
pub fn write(fd: RawFd, buf: &[u8]) -> Result<usize, OsError> {
    let n = cerr("write", unsafe {
        libc::write(fd, buf.as_ptr().cast(), buf.len())
    })?;
    Ok(n as usize)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io::{Read, Write},
        os::{
            fd::{AsRawFd, FromRawFd, IntoRawFd},
            unix::fs::PermissionsExt,
        },
        path::PathBuf,
    };

    use pretty_assertions::assert_eq;

    use super::*;

    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("Failed to get system time")
            .as_nanos();
        let pid = std::process::id();

        let filename = format!("unixy_test_{name}_{pid}_{timestamp}");
        std::env::temp_dir().join(filename)
    }

    #[test]
    fn pipe_roundtrip() {
        let (rx, tx) = pipe().unwrap();
        let message = b"the quick brown fox\0\xff";

        assert_eq!(tx.write(message).unwrap(), message.len());

        let mut buf = [0u8; 64];
        let n = rx.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], message);

        tx.close().unwrap();
        // End of stream once every write end is gone.
        assert_eq!(rx.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn read_fills_at_most_the_buffer() {
        let (rx, tx) = pipe().unwrap();
        (&tx).write_all(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(rx.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");

        let mut rest = Vec::new();
        drop(tx);
        (&rx).read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"ef");
    }

    #[test]
    fn drop_releases_descriptor() {
        let (rx, tx) = pipe().unwrap();
        drop(tx);
        // The only write end is gone.
        assert_eq!(rx.read(&mut [0; 8]).unwrap(), 0);
        rx.close().unwrap();
    }

    #[test]
    fn into_raw_fd_leaks_descriptor() {
        let (rx, tx) = pipe().unwrap();
        let raw = tx.into_raw_fd();
        write(raw, b"x").unwrap();
        assert_eq!(rx.read(&mut [0; 8]).unwrap(), 1);
        unsafe { FileDescriptor::from_raw_fd(raw) }.close().unwrap();
    }

    #[test]
    fn close_invalid_descriptor() {
        let err = unsafe { FileDescriptor::from_raw_fd(1 << 20) }.close().unwrap_err();
        assert_eq!(err.operation(), "close");
        assert_eq!(err.code(), libc::EBADF);
    }

    #[test]
    fn read_invalid_descriptor() {
        let err = read(-1, &mut [0; 8]).unwrap_err();
        assert_eq!(err.operation(), "read");
        assert_eq!(err.code(), libc::EBADF);
    }

    #[test]
    fn open_create_write_and_read_back() {
        let path = temp_path("open");

        let file = open(
            &path,
            OpenFlags::write_only().create().truncate(),
            Mode::empty().user_read().user_write().group_read(),
        )
        .unwrap();
        file.write(b"hello").unwrap();
        file.close().unwrap();

        let file = open(&path, OpenFlags::write_only().append(), Mode::empty()).unwrap();
        file.write(b" world").unwrap();
        drop(file);

        let file = open(&path, OpenFlags::read_only(), Mode::empty()).unwrap();
        let mut buf = [0u8; 32];
        let n = file.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");

        // The umask may only clear bits.
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o600, 0o600);
        assert_eq!(mode & 0o137, 0);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn open_missing_file() {
        let err = open(temp_path("missing"), OpenFlags::read_only(), Mode::empty()).unwrap_err();
        assert_eq!(err.operation(), "open");
        assert_eq!(err.code(), libc::ENOENT);

        let err = open("a\0b", OpenFlags::read_only(), Mode::empty()).unwrap_err();
        assert_eq!(err.code(), libc::EINVAL);
    }

    #[test]
    fn borrowed_descriptor_has_raw_fd() {
        fn raw_fd_of<F: AsRawFd>(fd: F) -> RawFd {
            fd.as_raw_fd()
        }

        let (rx, _tx) = pipe().unwrap();
        assert_eq!(raw_fd_of(&rx), rx.as_raw_fd());
    }

    #[test]
    fn dup_onto_redirects() {
        let (rx, tx) = pipe().unwrap();
        let (_other_rx, other_tx) = pipe().unwrap();

        tx.dup_onto(other_tx.as_raw_fd()).unwrap();
        other_tx.write(b"via dup").unwrap();

        let mut buf = [0u8; 16];
        let n = rx.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"via dup");
    }

    #[test]
    fn set_cloexec_marks_descriptor() {
        let (rx, _tx) = pipe().unwrap();
        let flags = unsafe { libc::fcntl(rx.as_raw_fd(), libc::F_GETFD) };
        assert_eq!(flags & libc::FD_CLOEXEC, 0);
        rx.set_cloexec().unwrap();
        let flags = unsafe { libc::fcntl(rx.as_raw_fd(), libc::F_GETFD) };
        assert_ne!(flags & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn cloexec_pipe() {
        let (rx, tx) = pipe_cloexec().unwrap();
        for fd in [rx.as_raw_fd(), tx.as_raw_fd()] {
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }
}
