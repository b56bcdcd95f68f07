// src/exec/pty.rs

//! Pseudo-terminal transport.
//!
//! The child gets the slave side of a fresh PTY as stdin, stdout and stderr,
//! so it behaves as it would in an interactive terminal (colours, progress
//! bars). The master side is read as a single `stdout` channel; stderr is
//! indistinguishable on a terminal.

use std::io;

use tokio::process::{Child, Command};

use crate::exec::launcher::OutputStream;
use crate::types::Channel;

/// Whether this platform can run the PTY transport.
pub const SUPPORTED: bool = cfg!(unix);

#[cfg(unix)]
pub fn launch_with_pty(
    mut cmd: Command,
    cols: u16,
    rows: u16,
) -> io::Result<(Child, Vec<(Channel, OutputStream)>)> {
    use std::process::Stdio;

    use nix::pty::{Winsize, openpty};
    use nix::sys::termios::Termios;
    use tracing::debug;

    let winsize = Winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let pty = openpty(Some(&winsize), None::<&Termios>).map_err(io::Error::from)?;

    cmd.stdin(Stdio::from(pty.slave.try_clone()?))
        .stdout(Stdio::from(pty.slave.try_clone()?))
        .stderr(Stdio::from(pty.slave));

    let child = cmd.spawn()?;
    // Our copies of the slave live inside `cmd`; they must be closed so the
    // master sees end-of-stream once the child tree is gone.
    drop(cmd);

    debug!(cols, rows, "pty allocated for child");

    let master = PtyMaster::new(pty.master)?;
    let outputs: Vec<(Channel, OutputStream)> = vec![(Channel::Stdout, Box::new(master))];
    Ok((child, outputs))
}

/// Master side of the PTY in non-blocking mode, driven by the reactor.
///
/// A descendant holding the slave must not pin a runtime thread past the
/// terminal event. Linux reports `EIO` instead of end-of-file once every
/// slave descriptor is closed; that reads as a clean end of stream.
#[cfg(unix)]
struct PtyMaster(tokio::io::unix::AsyncFd<std::fs::File>);

#[cfg(unix)]
impl PtyMaster {
    fn new(fd: std::os::fd::OwnedFd) -> io::Result<Self> {
        use std::os::fd::AsRawFd;

        use nix::fcntl::{FcntlArg, OFlag, fcntl};

        let raw = fd.as_raw_fd();
        let flags = OFlag::from_bits_truncate(fcntl(raw, FcntlArg::F_GETFL)?);
        fcntl(raw, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;

        Ok(Self(tokio::io::unix::AsyncFd::new(std::fs::File::from(fd))?))
    }
}

#[cfg(unix)]
impl tokio::io::AsyncRead for PtyMaster {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        use std::io::Read;
        use std::task::{Poll, ready};

        loop {
            let mut guard = ready!(self.0.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            let res = guard.try_io(|inner| {
                let mut file: &std::fs::File = inner.get_ref();
                file.read(unfilled)
            });

            match res {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) if err.raw_os_error() == Some(nix::libc::EIO) => {
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                // Spurious readiness; the guard cleared it, wait again.
                Err(_would_block) => continue,
            }
        }
    }
}

#[cfg(not(unix))]
pub fn launch_with_pty(
    _cmd: Command,
    _cols: u16,
    _rows: u16,
) -> io::Result<(Child, Vec<(Channel, OutputStream)>)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pty transport is not supported on this platform",
    ))
}
