//! Vorbis 头包解析: identification 与 comment.
//!
//! 三个头包按 identification → comment → setup 的固定顺序出现,
//! 每个头包以 1 字节类型 (0x01/0x03/0x05) 加 "vorbis" 标识开头.

use ling_core::{LingError, LingResult};

use super::bitreader::LsbBitReader;

/// 支持的最大声道数
pub(crate) const MAX_CHANNELS: u32 = 20;

/// identification 头包内容
#[derive(Debug, Clone)]
pub(crate) struct IdentHeader {
    /// 声道数 C (≤ 20)
    pub(crate) channels: u32,
    /// 采样率 F (Hz)
    pub(crate) sample_rate: u32,
    /// 两档块大小 [B0, B1], 均为 2 的幂, 64 ≤ B0 ≤ B1 ≤ 8192
    pub(crate) blocksize: [usize; 2],
    /// 标称码率 (bits/s, 0 表示未知)
    pub(crate) bitrate_nominal: u32,
}

/// 校验头包类型字节与 "vorbis" 标识
fn check_header_magic(br: &mut LsbBitReader<'_>, packet_type: u8) -> LingResult<()> {
    let mut magic = [0u8; 7];
    br.read_bytes(&mut magic);
    if magic[0] != packet_type || &magic[1..] != b"vorbis" {
        return Err(LingError::InvalidData(format!(
            "Vorbis 头包标识无效 (期望类型 0x{:02X})",
            packet_type,
        )));
    }
    Ok(())
}

/// 解析 identification 头包 (类型 0x01)
pub(crate) fn parse_identification(packet: &[u8]) -> LingResult<IdentHeader> {
    let mut br = LsbBitReader::new(packet);
    check_header_magic(&mut br, 0x01)?;

    let version = br.read_bits(32);
    if version != 0 {
        return Err(LingError::Unsupported(format!(
            "Vorbis 版本不支持: {}",
            version,
        )));
    }

    let channels = br.read_bits(8);
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(LingError::Unsupported(format!(
            "Vorbis 声道数不支持: {}",
            channels,
        )));
    }

    let sample_rate = br.read_bits(32);
    if sample_rate == 0 {
        return Err(LingError::InvalidData("Vorbis 采样率不能为 0".into()));
    }

    let _bitrate_maximum = br.read_bits(32);
    let bitrate_nominal = br.read_bits(32);
    let _bitrate_minimum = br.read_bits(32);

    let bs0_exp = br.read_bits(4);
    let bs1_exp = br.read_bits(4);
    let blocksize0 = 1usize << bs0_exp;
    let blocksize1 = 1usize << bs1_exp;
    if bs0_exp < 6 || bs1_exp < bs0_exp || blocksize1 > 8192 {
        return Err(LingError::InvalidData(format!(
            "Vorbis blocksize 非法: {}, {}",
            blocksize0, blocksize1,
        )));
    }

    if !br.read_flag() || br.is_end_of_packet() {
        return Err(LingError::InvalidData(
            "Vorbis identification 头包 framing_flag 非法".into(),
        ));
    }

    Ok(IdentHeader {
        channels,
        sample_rate,
        blocksize: [blocksize0, blocksize1],
        bitrate_nominal,
    })
}

/// comment 头包内容
#[derive(Debug, Clone, Default)]
pub(crate) struct CommentHeader {
    /// 编码器厂商字符串
    pub(crate) vendor: String,
    /// 用户注释 "NAME=value" 对; 重复键的值以 `|` 连接
    pub(crate) comments: Vec<(String, String)>,
}

/// 解析 comment 头包 (类型 0x03)
pub(crate) fn parse_comment(packet: &[u8]) -> LingResult<CommentHeader> {
    let mut br = LsbBitReader::new(packet);
    check_header_magic(&mut br, 0x03)?;

    let vendor = String::from_utf8_lossy(&br.read_string()).into_owned();
    let list_count = br.read_bits(32);
    let mut comments: Vec<(String, String)> = Vec::new();
    for _ in 0..list_count {
        if br.is_end_of_packet() {
            return Err(LingError::InvalidData(
                "Vorbis comment 头包提前截断".into(),
            ));
        }
        let raw = br.read_string();
        let text = String::from_utf8_lossy(&raw);
        // 规范不要求键唯一, 此处将重复键的值合并
        if let Some(pos) = text.find('=') {
            let key = text[..pos].to_string();
            let value = &text[pos + 1..];
            match comments.iter_mut().find(|(k, _)| *k == key) {
                Some((_, v)) => {
                    v.push('|');
                    v.push_str(value);
                }
                None => comments.push((key, value.to_string())),
            }
        }
    }

    if !br.read_flag() || br.is_end_of_packet() {
        return Err(LingError::InvalidData(
            "Vorbis comment 头包 framing_flag 非法".into(),
        ));
    }

    Ok(CommentHeader { vendor, comments })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_ident_packet(channels: u8, sample_rate: u32, bs_byte: u8) -> Vec<u8> {
        let mut v = Vec::new();
        v.push(0x01);
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&0u32.to_le_bytes());
        v.push(channels);
        v.extend_from_slice(&sample_rate.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&128_000i32.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.push(bs_byte);
        v.push(1);
        v
    }

    #[test]
    fn test_parse_identification() {
        // 低半字节 blocksize0 指数, 高半字节 blocksize1 指数
        let h = parse_identification(&build_ident_packet(2, 44100, (11 << 4) | 8)).unwrap();
        assert_eq!(h.channels, 2);
        assert_eq!(h.sample_rate, 44100);
        assert_eq!(h.blocksize, [256, 2048]);
        assert_eq!(h.bitrate_nominal, 128_000);
    }

    #[test]
    fn test_非法_blocksize_被拒绝() {
        // blocksize0 = 32 (指数 5) 低于下限
        assert!(parse_identification(&build_ident_packet(2, 44100, (8 << 4) | 5)).is_err());
        // blocksize1 < blocksize0
        assert!(parse_identification(&build_ident_packet(2, 44100, (6 << 4) | 8)).is_err());
    }

    #[test]
    fn test_声道数超限被拒绝() {
        let err = parse_identification(&build_ident_packet(21, 44100, (8 << 4) | 8)).unwrap_err();
        assert!(matches!(err, LingError::Unsupported(_)));
    }

    #[test]
    fn test_parse_comment() {
        let mut v = Vec::new();
        v.push(0x03);
        v.extend_from_slice(b"vorbis");
        v.extend_from_slice(&4u32.to_le_bytes());
        v.extend_from_slice(b"ling");
        v.extend_from_slice(&2u32.to_le_bytes());
        v.extend_from_slice(&(9u32).to_le_bytes());
        v.extend_from_slice(b"TITLE=foo");
        v.extend_from_slice(&(9u32).to_le_bytes());
        v.extend_from_slice(b"TITLE=bar");
        v.push(1);

        let c = parse_comment(&v).unwrap();
        assert_eq!(c.vendor, "ling");
        // 重复键合并
        assert_eq!(c.comments, vec![("TITLE".to_string(), "foo|bar".to_string())]);
    }

    #[test]
    fn test_comment_标识无效() {
        let mut v = vec![0x04];
        v.extend_from_slice(b"vorbis");
        assert!(parse_comment(&v).is_err());
    }
}
