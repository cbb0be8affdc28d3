use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::ptr;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{PingError, PingResult};
use crate::transport::IcmpSocket;

/// ICMP ignores ports, but `sockaddr_in` still carries one.
const DEST_PORT: u16 = 1;

/// Raw `AF_INET`/`SOCK_RAW`/`IPPROTO_ICMP` socket, closed on drop.
#[derive(Debug)]
pub struct LibcSocket {
    fd: libc::c_int,
}

impl LibcSocket {
    pub fn open() -> PingResult<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_ICMP) };
        if fd == -1 {
            return Err(PingError::SocketOpen(io::Error::last_os_error()));
        }
        if fd as usize >= libc::FD_SETSIZE {
            unsafe { libc::close(fd) };
            return Err(PingError::FdOutOfRange(fd));
        }
        debug!(fd, "Opened raw ICMP socket");
        Ok(Self { fd })
    }
}

impl Drop for LibcSocket {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
            self.fd = -1;
        }
    }
}

fn sockaddr_for(dest: Ipv4Addr) -> libc::sockaddr_in {
    let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
    addr.sin_family = libc::AF_INET as libc::sa_family_t;
    addr.sin_port = DEST_PORT.to_be();
    addr.sin_addr = libc::in_addr {
        s_addr: u32::from_ne_bytes(dest.octets()),
    };
    addr
}

fn timeval_for(timeout: Duration) -> libc::timeval {
    libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    }
}

impl IcmpSocket for LibcSocket {
    fn send_to(&mut self, packet: &[u8], dest: Ipv4Addr) -> PingResult<()> {
        let addr = sockaddr_for(dest);
        let rc = unsafe {
            libc::sendto(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
                0,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(PingError::Send(io::Error::last_os_error()));
        }
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> PingResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let mut tv = timeval_for(deadline.saturating_duration_since(Instant::now()));
            let rc = unsafe {
                let mut readfds: libc::fd_set = mem::zeroed();
                libc::FD_ZERO(&mut readfds);
                libc::FD_SET(self.fd, &mut readfds);
                libc::select(
                    self.fd + 1,
                    &mut readfds,
                    ptr::null_mut(),
                    ptr::null_mut(),
                    &mut tv,
                )
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(PingError::Wait(err));
            }
            return Ok(rc > 0);
        }
    }

    fn recv(&mut self, buf: &mut [u8]) -> PingResult<usize> {
        let rc = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(PingError::Receive(io::Error::last_os_error()));
        }
        Ok(rc as usize)
    }
}
