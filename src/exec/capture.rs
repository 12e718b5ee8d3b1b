//! Process-wide stdout/stderr interception for in-process calls.
//!
//! While a `Redirect` is alive, fd 1 writes into a pipe drained by a reader
//! thread and fd 2 goes to `/dev/null`. Dropping the guard restores both
//! descriptors on every path, panics included. Only one redirect may be
//! active at a time; callers hold the in-process gate.
//!
//! The saved descriptors and the pipe's read end are close-on-exec, so
//! children spawned meanwhile never see the real stdout. fd 1 itself is
//! inherited on purpose: a child a handler spawns writes into the capture,
//! and `finish` waits until every such child has closed it.

#[cfg(unix)]
pub use imp::Redirect;

#[cfg(not(unix))]
pub use fallback::Redirect;

#[cfg(unix)]
mod imp {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use std::thread::JoinHandle;

    const STDOUT: RawFd = 1;
    const STDERR: RawFd = 2;

    pub struct Redirect {
        saved_stdout: Option<OwnedFd>,
        saved_stderr: Option<OwnedFd>,
        reader: Option<JoinHandle<Vec<u8>>>,
    }

    fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret)
        }
    }

    fn dup_cloexec(fd: RawFd) -> io::Result<OwnedFd> {
        // SAFETY: fcntl only reads `fd`; an invalid one yields EBADF.
        let new = check(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 0) })?;
        // SAFETY: `new` is a freshly duplicated descriptor we own.
        Ok(unsafe { OwnedFd::from_raw_fd(new) })
    }

    fn dup2(from: RawFd, to: RawFd) -> io::Result<()> {
        // SAFETY: dup2 only operates on descriptor numbers; failures return -1.
        check(unsafe { libc::dup2(from, to) }).map(|_| ())
    }

    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn pipe_cloexec() -> io::Result<(File, OwnedFd)> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` has room for the two descriptors pipe2 writes.
        check(unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) })?;
        // SAFETY: both ends were just created by pipe2(2).
        Ok(unsafe { (File::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    fn pipe_cloexec() -> io::Result<(File, OwnedFd)> {
        let mut fds = [0 as libc::c_int; 2];
        // SAFETY: `fds` has room for the two descriptors pipe writes.
        check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        // SAFETY: both ends were just created by pipe(2).
        let ends = unsafe { (File::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        for fd in [fds[0], fds[1]] {
            // SAFETY: `fd` is open and owned by `ends`.
            check(unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) })?;
        }
        Ok(ends)
    }

    impl Redirect {
        pub fn begin() -> io::Result<Self> {
            io::stdout().flush()?;
            io::stderr().flush()?;

            let (read_end, write_end) = pipe_cloexec()?;

            let saved_stdout = dup_cloexec(STDOUT)?;
            let saved_stderr = dup_cloexec(STDERR)?;
            let devnull = OpenOptions::new().write(true).open("/dev/null")?;

            let mut guard = Redirect {
                saved_stdout: Some(saved_stdout),
                saved_stderr: Some(saved_stderr),
                reader: None,
            };
            dup2(write_end.as_raw_fd(), STDOUT)?;
            dup2(devnull.as_raw_fd(), STDERR)?;
            // fd 1 is now the only write end; EOF arrives once it is restored.
            drop(write_end);

            guard.reader = Some(std::thread::spawn(move || {
                let mut buf = Vec::new();
                let mut read_end = read_end;
                if let Err(e) = read_end.read_to_end(&mut buf) {
                    tracing::debug!(error = %e, "stdout interception pipe read failed");
                }
                buf
            }));
            Ok(guard)
        }

        /// Restore the descriptors and return everything written to fd 1.
        pub fn finish(mut self) -> Vec<u8> {
            self.restore();
            self.reader
                .take()
                .and_then(|h| h.join().ok())
                .unwrap_or_default()
        }

        fn restore(&mut self) {
            let _ = io::stdout().flush();
            if let Some(fd) = self.saved_stdout.take()
                && let Err(e) = dup2(fd.as_raw_fd(), STDOUT)
            {
                tracing::error!(error = %e, "failed to restore stdout");
            }
            if let Some(fd) = self.saved_stderr.take()
                && let Err(e) = dup2(fd.as_raw_fd(), STDERR)
            {
                tracing::error!(error = %e, "failed to restore stderr");
            }
        }
    }

    impl Drop for Redirect {
        fn drop(&mut self) {
            self.restore();
            if let Some(h) = self.reader.take() {
                let _ = h.join();
            }
        }
    }

}

#[cfg(not(unix))]
mod fallback {
    use std::io;

    /// Stream interception is unavailable; handlers' stray writes pass through.
    pub struct Redirect;

    impl Redirect {
        pub fn begin() -> io::Result<Self> {
            Ok(Redirect)
        }

        pub fn finish(self) -> Vec<u8> {
            Vec::new()
        }
    }
}
