//! conntrack 넷링크 소켓
//!
//! `NETLINK_NETFILTER` 프로토콜 소켓을 열고 conntrack 멀티캐스트
//! 그룹(NEW/UPDATE/DESTROY)에 가입합니다. 추가로 두 소켓 옵션을
//! 설정합니다:
//!
//! - `NETLINK_LISTEN_ALL_NSID`: 모든 네트워크 네임스페이스의
//!   알림을 수신
//! - `NETLINK_NO_ENOBUFS`: 수신 버퍼 고갈 시 ENOBUFS 에러로 스트림이
//!   끊기지 않도록 억제

use std::os::fd::AsRawFd;

use bytes::BytesMut;
use netlink_sys::protocols::NETLINK_NETFILTER;
use netlink_sys::{AsyncSocket, AsyncSocketExt, SocketAddr, TokioSocket};

use crate::error::ConntrackError;

// nfnetlink conntrack 멀티캐스트 그룹 (linux/netfilter/nfnetlink.h)
const NFNLGRP_CONNTRACK_NEW: u32 = 1;
const NFNLGRP_CONNTRACK_UPDATE: u32 = 2;
const NFNLGRP_CONNTRACK_DESTROY: u32 = 3;

// SOL_NETLINK 소켓 옵션 (linux/netlink.h)
const NETLINK_NO_ENOBUFS: libc::c_int = 5;
const NETLINK_LISTEN_ALL_NSID: libc::c_int = 8;

/// 수신 버퍼 크기. 커널 datagram 하나가 여러 넷링크 메시지를 담을
/// 수 있으므로 넉넉하게 잡습니다.
const RECV_BUFFER_CAPACITY: usize = 64 * 1024;

/// conntrack 이벤트 수신 소켓
pub struct ConntrackSocket {
    socket: TokioSocket,
    buffer: BytesMut,
}

impl ConntrackSocket {
    /// 소켓을 열고 그룹 가입과 옵션 설정을 수행합니다.
    ///
    /// 어느 단계든 실패하면 치명적이며 데몬 기동이 중단됩니다.
    pub fn open() -> Result<Self, ConntrackError> {
        let mut socket = TokioSocket::new(NETLINK_NETFILTER)
            .map_err(|e| ConntrackError::socket("open netlink socket", e))?;

        socket
            .socket_mut()
            .bind(&SocketAddr::new(0, 0))
            .map_err(|e| ConntrackError::socket("bind netlink socket", e))?;

        for group in [
            NFNLGRP_CONNTRACK_NEW,
            NFNLGRP_CONNTRACK_UPDATE,
            NFNLGRP_CONNTRACK_DESTROY,
        ] {
            socket
                .socket_mut()
                .add_membership(group)
                .map_err(|e| ConntrackError::socket(format!("join group {group}"), e))?;
        }

        set_netlink_option(socket.socket_ref().as_raw_fd(), NETLINK_LISTEN_ALL_NSID)
            .map_err(|e| ConntrackError::socket("set NETLINK_LISTEN_ALL_NSID", e))?;
        set_netlink_option(socket.socket_ref().as_raw_fd(), NETLINK_NO_ENOBUFS)
            .map_err(|e| ConntrackError::socket("set NETLINK_NO_ENOBUFS", e))?;

        Ok(Self {
            socket,
            buffer: BytesMut::with_capacity(RECV_BUFFER_CAPACITY),
        })
    }

    /// datagram 하나를 수신하여 그 바이트를 반환합니다.
    ///
    /// 반환된 슬라이스는 다음 `recv` 호출까지 유효합니다.
    pub async fn recv(&mut self) -> Result<&[u8], ConntrackError> {
        self.buffer.clear();
        self.socket
            .recv(&mut self.buffer)
            .await
            .map_err(ConntrackError::Listener)?;
        Ok(&self.buffer)
    }
}

/// SOL_NETLINK 수준의 불리언 소켓 옵션을 켭니다.
///
/// netlink-sys가 노출하지 않는 옵션이라 raw fd에 직접 설정합니다.
fn set_netlink_option(fd: libc::c_int, option: libc::c_int) -> std::io::Result<()> {
    let value: libc::c_int = 1;
    // SAFETY: fd는 살아 있는 넷링크 소켓이고, value는 유효한
    // c_int 포인터와 길이로 전달된다.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_NETLINK,
            option,
            &value as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

impl std::fmt::Debug for ConntrackSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConntrackSocket").finish_non_exhaustive()
    }
}
