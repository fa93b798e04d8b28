use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tokio::net::UdpSocket;

/// SMA meters broadcast to this group on port 9522.
pub const MC_IP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 12, 255, 254);
pub const PORT: u16 = 9522;

pub struct UdpReceiver {
    socket: UdpSocket,
    bufsize: usize,
}

impl UdpReceiver {
    /// Binds to `address:port` and joins the group on `interface` if the
    /// address is a multicast one. Must be called inside a tokio runtime.
    pub fn bind(address: Ipv4Addr, port: u16, interface: Ipv4Addr, bufsize: usize) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SocketAddrV4::new(address, port).into())?;

        if address.is_multicast() {
            debug!("Joining multicast group {} on {}", address, interface);
            socket.join_multicast_v4(&address, &interface)?;
        }

        let socket = UdpSocket::from_std(socket.into())?;
        Ok(Self { socket, bufsize })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Waits for the next datagram. Anything beyond `bufsize` is cut off by the OS.
    pub async fn receive(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; self.bufsize];
        let (len, source) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_unicast() {
        let receiver = UdpReceiver::bind(Ipv4Addr::LOCALHOST, 0, Ipv4Addr::UNSPECIFIED, 1024).unwrap();
        let target = receiver.local_addr().unwrap();

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"SMA\0payload", target).unwrap();

        let (data, source) = receiver.receive().await.unwrap();
        assert_eq!(data, b"SMA\0payload".to_vec());
        assert_eq!(source, sender.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_receive_cuts_at_bufsize() {
        let receiver = UdpReceiver::bind(Ipv4Addr::LOCALHOST, 0, Ipv4Addr::UNSPECIFIED, 8).unwrap();
        let target = receiver.local_addr().unwrap();

        let sender = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(&[7u8; 32], target).unwrap();

        let (data, _) = receiver.receive().await.unwrap();
        assert_eq!(data.len(), 8);
    }
}
