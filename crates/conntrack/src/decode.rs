//! ctnetlink 디코더 — 넷링크 datagram을 [`FlowEvent`]로 변환
//!
//! datagram 하나에는 넷링크 메시지가 여러 개 들어올 수 있습니다.
//! conntrack 서브시스템이 아닌 메시지는 건너뛰고, conntrack
//! 메시지는 nfgenmsg 헤더 뒤의 중첩 속성 트리를 순회하여 원본
//! 방향 튜플(주소/포트/프로토콜), 플로우 ID, TCP 상태를 뽑아냅니다.
//!
//! 이벤트 종류는 메시지 타입과 헤더 플래그로 판정합니다:
//! DELETE 메시지는 DESTROY, `NLM_F_CREATE|NLM_F_EXCL` 플래그가
//! 있으면 NEW, 그 외에는 UPDATE입니다.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use netlink_packet_core::{NetlinkBuffer, NLM_F_CREATE, NLM_F_EXCL};
use netlink_packet_utils::nla::{NlasIterator, NLA_TYPE_MASK};
use netlink_packet_utils::parsers::{parse_u16_be, parse_u32_be, parse_u8};

use conntrackd_core::event::{EventKind, FlowEvent, TcpState};

use crate::error::ConntrackError;

// nfnetlink 서브시스템과 메시지 타입 (linux/netfilter/nfnetlink.h)
const NFNL_SUBSYS_CTNETLINK: u16 = 1;
const IPCTNL_MSG_CT_DELETE: u16 = 2;

// 제어 메시지 타입의 상한 (linux/netlink.h, NLMSG_MIN_TYPE)
const NLMSG_MIN_TYPE: u16 = 0x10;

// conntrack 속성 (linux/netfilter/nfnetlink_conntrack.h)
const CTA_TUPLE_ORIG: u16 = 1;
const CTA_PROTOINFO: u16 = 4;
const CTA_ID: u16 = 12;

const CTA_TUPLE_IP: u16 = 1;
const CTA_TUPLE_PROTO: u16 = 2;

const CTA_IP_V4_SRC: u16 = 1;
const CTA_IP_V4_DST: u16 = 2;
const CTA_IP_V6_SRC: u16 = 3;
const CTA_IP_V6_DST: u16 = 4;

const CTA_PROTO_NUM: u16 = 1;
const CTA_PROTO_SRC_PORT: u16 = 2;
const CTA_PROTO_DST_PORT: u16 = 3;

const CTA_PROTOINFO_TCP: u16 = 1;
const CTA_PROTOINFO_TCP_STATE: u16 = 1;

/// nfgenmsg 헤더 길이 (family, version, res_id)
const NFGENMSG_LEN: usize = 4;

/// datagram 하나를 디코딩합니다.
///
/// conntrack 외 서브시스템과 제어 메시지는 건너뜁니다. 프레이밍이
/// 깨졌거나 conntrack 메시지에 필수 속성이 없으면 에러를 반환하며,
/// 리스너는 이를 datagram 단위로 흡수합니다.
pub fn decode_datagram(data: &[u8]) -> Result<Vec<FlowEvent>, ConntrackError> {
    let mut events = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let buffer = NetlinkBuffer::new_checked(&data[offset..])
            .map_err(ConntrackError::decode)?;
        let length = buffer.length() as usize;
        if length == 0 {
            break;
        }

        let message_type = buffer.message_type();
        if message_type >= NLMSG_MIN_TYPE && message_type >> 8 == NFNL_SUBSYS_CTNETLINK {
            let kind = event_kind(message_type & 0xff, buffer.flags());
            events.push(decode_flow(kind, buffer.payload())?);
        }

        // 넷링크 메시지는 4바이트 정렬
        offset += (length + 3) & !3;
    }

    Ok(events)
}

/// 메시지 타입과 헤더 플래그로 이벤트 종류를 판정합니다.
fn event_kind(ct_type: u16, flags: u16) -> EventKind {
    if ct_type == IPCTNL_MSG_CT_DELETE {
        EventKind::Destroy
    } else if flags & (NLM_F_CREATE | NLM_F_EXCL) != 0 {
        EventKind::New
    } else {
        EventKind::Update
    }
}

/// conntrack 메시지 페이로드(nfgenmsg + 속성)를 디코딩합니다.
fn decode_flow(kind: EventKind, payload: &[u8]) -> Result<FlowEvent, ConntrackError> {
    if payload.len() < NFGENMSG_LEN {
        return Err(ConntrackError::decode("truncated nfgenmsg"));
    }
    let attributes = &payload[NFGENMSG_LEN..];

    let mut src_addr = None;
    let mut dst_addr = None;
    let mut src_port = 0u16;
    let mut dst_port = 0u16;
    let mut protocol = 0u8;
    let mut flow_id = 0u32;
    let mut tcp_state = None;

    for nla in NlasIterator::new(attributes) {
        let nla = nla.map_err(ConntrackError::decode)?;
        match nla.kind() & NLA_TYPE_MASK {
            CTA_TUPLE_ORIG => {
                for tuple_nla in NlasIterator::new(nla.value()) {
                    let tuple_nla = tuple_nla.map_err(ConntrackError::decode)?;
                    match tuple_nla.kind() & NLA_TYPE_MASK {
                        CTA_TUPLE_IP => {
                            for ip_nla in NlasIterator::new(tuple_nla.value()) {
                                let ip_nla = ip_nla.map_err(ConntrackError::decode)?;
                                let addr = parse_addr(ip_nla.value())?;
                                match ip_nla.kind() & NLA_TYPE_MASK {
                                    CTA_IP_V4_SRC | CTA_IP_V6_SRC => src_addr = Some(addr),
                                    CTA_IP_V4_DST | CTA_IP_V6_DST => dst_addr = Some(addr),
                                    _ => {}
                                }
                            }
                        }
                        CTA_TUPLE_PROTO => {
                            for proto_nla in NlasIterator::new(tuple_nla.value()) {
                                let proto_nla = proto_nla.map_err(ConntrackError::decode)?;
                                match proto_nla.kind() & NLA_TYPE_MASK {
                                    CTA_PROTO_NUM => {
                                        protocol = parse_u8(proto_nla.value())
                                            .map_err(ConntrackError::decode)?;
                                    }
                                    CTA_PROTO_SRC_PORT => {
                                        src_port = parse_u16_be(proto_nla.value())
                                            .map_err(ConntrackError::decode)?;
                                    }
                                    CTA_PROTO_DST_PORT => {
                                        dst_port = parse_u16_be(proto_nla.value())
                                            .map_err(ConntrackError::decode)?;
                                    }
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
            CTA_ID => {
                flow_id = parse_u32_be(nla.value()).map_err(ConntrackError::decode)?;
            }
            CTA_PROTOINFO => {
                for info_nla in NlasIterator::new(nla.value()) {
                    let info_nla = info_nla.map_err(ConntrackError::decode)?;
                    if info_nla.kind() & NLA_TYPE_MASK == CTA_PROTOINFO_TCP {
                        for tcp_nla in NlasIterator::new(info_nla.value()) {
                            let tcp_nla = tcp_nla.map_err(ConntrackError::decode)?;
                            if tcp_nla.kind() & NLA_TYPE_MASK == CTA_PROTOINFO_TCP_STATE {
                                let raw =
                                    parse_u8(tcp_nla.value()).map_err(ConntrackError::decode)?;
                                tcp_state = TcpState::from_raw(raw);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    let src_addr = src_addr.ok_or_else(|| ConntrackError::decode("missing source address"))?;
    let dst_addr =
        dst_addr.ok_or_else(|| ConntrackError::decode("missing destination address"))?;

    Ok(FlowEvent {
        kind,
        flow_id,
        protocol,
        src_addr,
        dst_addr,
        src_port,
        dst_port,
        tcp_state,
    })
}

/// CTA_IP_* 속성 값을 IP 주소로 변환합니다.
fn parse_addr(value: &[u8]) -> Result<IpAddr, ConntrackError> {
    match value.len() {
        4 => {
            let octets: [u8; 4] = value.try_into().expect("length checked");
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = value.try_into().expect("length checked");
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(ConntrackError::decode(format!(
            "invalid address length {n}"
        ))),
    }
}
