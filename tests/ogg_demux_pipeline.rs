//! Ogg 解封装管线测试.
//!
//! 验证 packet 重组等价性: 对任意合法的 Ogg 流, 依次读出的 packet
//! 字节拼接应等于全部 packet 原始负载按序拼接 (含跨页与整 255 边界).

use ling::codec::CodecId;
use ling::core::LingError;
use ling::format::io::{IoContext, MemoryBackend};
use ling::format::{Demuxer, FormatId};

/// Ogg 页面 CRC-32
fn ogg_crc32(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            if crc & 0x8000_0000 != 0 {
                crc = (crc << 1) ^ 0x04C1_1DB7;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// 构建一个 Ogg 页面; `fragments` 中 complete=false 的片段长度
/// 必须是 255 的倍数 (lacing 不闭合, packet 跨页)
fn build_page(
    header_type: u8,
    granule: i64,
    serial: u32,
    page_seq: u32,
    fragments: &[(&[u8], bool)],
) -> Vec<u8> {
    let mut page = Vec::new();
    page.extend_from_slice(b"OggS");
    page.push(0);
    page.push(header_type);
    page.extend_from_slice(&(granule as u64).to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&page_seq.to_le_bytes());
    let crc_offset = page.len();
    page.extend_from_slice(&0u32.to_le_bytes());

    let mut segments = Vec::new();
    let mut body = Vec::new();
    for &(data, complete) in fragments {
        let mut remaining = data.len();
        while remaining >= 255 {
            segments.push(255u8);
            remaining -= 255;
        }
        if complete {
            segments.push(remaining as u8);
        } else {
            assert_eq!(remaining, 0, "跨页片段长度必须是 255 的倍数");
        }
        body.extend_from_slice(data);
    }
    page.push(segments.len() as u8);
    page.extend_from_slice(&segments);
    page.extend_from_slice(&body);

    let crc = ogg_crc32(&page);
    page[crc_offset..crc_offset + 4].copy_from_slice(&crc.to_le_bytes());
    page
}

/// Vorbis identification 头包 (立体声 44100 Hz)
fn vorbis_ident_packet() -> Vec<u8> {
    let mut v = Vec::new();
    v.push(1u8);
    v.extend_from_slice(b"vorbis");
    v.extend_from_slice(&0u32.to_le_bytes());
    v.push(2);
    v.extend_from_slice(&44100u32.to_le_bytes());
    v.extend_from_slice(&[0u8; 12]);
    v.push(0x88);
    v.push(1);
    v
}

#[test]
fn test_packet重组等价于负载按序拼接() {
    let serial = 0x5EED;
    // 各种长度形态: 短包, 跨两页的长包, 整 255 倍数包, 空包
    let p1 = vec![0xA1u8; 7];
    let p2: Vec<u8> = (0..900u32).map(|i| (i % 249) as u8).collect();
    let p3 = vec![0xC3u8; 255];
    let p4: Vec<u8> = Vec::new();
    let p5 = vec![0xE5u8; 100];

    let mut data = Vec::new();
    data.extend_from_slice(&build_page(
        0x02,
        0,
        serial,
        0,
        &[(&vorbis_ident_packet(), true)],
    ));
    // 页 1: p1 + p2 前 765 字节
    data.extend_from_slice(&build_page(
        0,
        -1,
        serial,
        1,
        &[(&p1, true), (&p2[..765], false)],
    ));
    // 页 2 (continued): p2 剩余 + p3 (整 255, 以零段闭合) + p4 (空包)
    data.extend_from_slice(&build_page(
        0x01,
        500,
        serial,
        2,
        &[(&p2[765..], true), (&p3, false)],
    ));
    // 页 3 (continued): p3 的闭合零段 + p4 + p5
    data.extend_from_slice(&build_page(
        0x01,
        900,
        serial,
        3,
        &[(&[], true), (&p4, true), (&p5, true)],
    ));
    // EOS
    data.extend_from_slice(&build_page(0x04, 1000, serial, 4, &[]));

    let registry = ling::default_format_registry();
    let mut io = IoContext::new(Box::new(MemoryBackend::from_data(data)));
    let mut demuxer = registry.open_input(&mut io, None).unwrap();
    assert_eq!(demuxer.format_id(), FormatId::Ogg);
    assert_eq!(demuxer.streams()[0].codec_id, CodecId::Vorbis);

    let mut sizes = Vec::new();
    let mut reassembled = Vec::new();
    loop {
        match demuxer.read_packet(&mut io) {
            Ok(pkt) => {
                sizes.push(pkt.size());
                reassembled.extend_from_slice(&pkt.data);
            }
            Err(LingError::Eof) => break,
            Err(e) => panic!("解封装失败: {}", e),
        }
    }

    assert_eq!(sizes, vec![p1.len(), p2.len(), p3.len(), p4.len(), p5.len()]);
    let mut expect = Vec::new();
    expect.extend_from_slice(&p1);
    expect.extend_from_slice(&p2);
    expect.extend_from_slice(&p3);
    expect.extend_from_slice(&p5);
    assert_eq!(reassembled, expect);
}
