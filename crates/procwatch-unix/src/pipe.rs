use nix::libc;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use procwatch_core::{Availability, OutputStream};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd};

nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

/// Read end of a child pipe that can report pending bytes without blocking
pub struct PipeStream<R> {
    inner: R,
}

impl<R: Read + AsFd + Send> PipeStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn hung_up(&self) -> io::Result<bool> {
        let mut fds = [PollFd::new(self.inner.as_fd(), PollFlags::POLLIN)];
        poll(&mut fds, PollTimeout::ZERO)?;
        Ok(fds[0].revents().is_some_and(|events| {
            events.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
        }))
    }
}

impl<R: Read + AsFd + Send> Read for PipeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + AsFd + Send> OutputStream for PipeStream<R> {
    fn poll_available(&mut self) -> io::Result<Availability> {
        let mut count: libc::c_int = 0;
        // SAFETY: FIONREAD stores a single c_int into `count`, and the
        // descriptor stays open for as long as `inner` is borrowed.
        unsafe { fionread(self.inner.as_fd().as_raw_fd(), &mut count) }?;

        if count > 0 {
            return Ok(Availability::Bytes(count as usize));
        }
        if self.hung_up()? {
            Ok(Availability::HungUp)
        } else {
            Ok(Availability::Pending)
        }
    }
}
