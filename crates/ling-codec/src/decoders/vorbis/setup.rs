//! Vorbis setup 头包解析.
//!
//! setup 头包 (类型 0x05) 依次携带 codebook、时域变换、floor、
//! residue、mapping、mode 六组配置, 以 1 位 framing 标志结尾.
//! 解析结果全部展开为自有结构, 音频包解码阶段不再回读头包.

use ling_core::{LingError, LingResult};

use super::bitreader::{LsbBitReader, ilog};
use super::codebook::Codebook;
use super::floor::Floor;
use super::residue::Residue;

/// 声道耦合步骤: (幅度声道, 角度声道)
#[derive(Debug, Clone, Copy)]
pub(crate) struct CouplingStep {
    pub(crate) magnitude: u32,
    pub(crate) angle: u32,
}

/// mapping 配置: 声道到 submap 的指派与耦合关系
#[derive(Debug, Clone)]
pub(crate) struct Mapping {
    /// submap 数 (1..=16)
    pub(crate) submaps: u8,
    /// 耦合步骤, 按声明顺序
    pub(crate) coupling_steps: Vec<CouplingStep>,
    /// 每个声道所属的 submap
    pub(crate) mux: Vec<u8>,
    /// 每个 submap 使用的 floor 下标
    pub(crate) submap_floor: Vec<u8>,
    /// 每个 submap 使用的 residue 下标
    pub(crate) submap_residue: Vec<u8>,
}

impl Mapping {
    fn read(
        br: &mut LsbBitReader<'_>,
        channels: u32,
        floor_count: usize,
        residue_count: usize,
    ) -> LingResult<Self> {
        let mapping_type = br.read_bits(16);
        if mapping_type != 0 {
            return Err(LingError::InvalidData(format!(
                "Vorbis mapping 类型不支持: {}",
                mapping_type,
            )));
        }

        let submaps = if br.read_flag() {
            (br.read_bits(4) + 1) as u8
        } else {
            1
        };

        let mut coupling_steps = Vec::new();
        if br.read_flag() {
            let step_count = br.read_bits(8) + 1;
            let ch_bits = ilog(channels - 1);
            for _ in 0..step_count {
                let magnitude = br.read_bits(ch_bits);
                let angle = br.read_bits(ch_bits);
                if magnitude == angle || magnitude >= channels || angle >= channels {
                    return Err(LingError::InvalidData(
                        "Vorbis coupling 声道参数非法".into(),
                    ));
                }
                coupling_steps.push(CouplingStep { magnitude, angle });
            }
        }

        if br.read_bits(2) != 0 {
            return Err(LingError::InvalidData(
                "Vorbis mapping 保留位必须为 0".into(),
            ));
        }

        let mut mux = vec![0u8; channels as usize];
        if submaps > 1 {
            for m in &mut mux {
                let v = br.read_bits(4) as u8;
                if v >= submaps {
                    return Err(LingError::InvalidData("Vorbis mapping mux 越界".into()));
                }
                *m = v;
            }
        }

        let mut submap_floor = Vec::with_capacity(submaps as usize);
        let mut submap_residue = Vec::with_capacity(submaps as usize);
        for _ in 0..submaps {
            let _time_submap = br.read_bits(8);
            let floor = br.read_bits(8);
            let residue = br.read_bits(8);
            if floor as usize >= floor_count || residue as usize >= residue_count {
                return Err(LingError::InvalidData(
                    "Vorbis mapping floor/residue 索引越界".into(),
                ));
            }
            submap_floor.push(floor as u8);
            submap_residue.push(residue as u8);
        }

        Ok(Self {
            submaps,
            coupling_steps,
            mux,
            submap_floor,
            submap_residue,
        })
    }
}

/// mode 配置: 每个音频包开头以 mode 号选择块大小与 mapping
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mode {
    /// 块大小标志: false = B0, true = B1
    pub(crate) block_flag: bool,
    /// mapping 下标
    pub(crate) mapping: u8,
}

impl Mode {
    fn read(br: &mut LsbBitReader<'_>, mapping_count: usize) -> LingResult<Self> {
        let block_flag = br.read_flag();
        let window_type = br.read_bits(16);
        let transform_type = br.read_bits(16);
        if window_type != 0 || transform_type != 0 {
            return Err(LingError::Unsupported(format!(
                "Vorbis mode window/transform 类型不支持: {}/{}",
                window_type, transform_type,
            )));
        }
        let mapping = br.read_bits(8);
        if mapping as usize >= mapping_count {
            return Err(LingError::InvalidData("Vorbis mode mapping 越界".into()));
        }
        Ok(Self {
            block_flag,
            mapping: mapping as u8,
        })
    }
}

/// setup 头包的完整解析结果
pub(crate) struct ParsedSetup {
    pub(crate) codebooks: Vec<Codebook>,
    pub(crate) floors: Vec<Floor>,
    pub(crate) residues: Vec<Residue>,
    pub(crate) mappings: Vec<Mapping>,
    pub(crate) modes: Vec<Mode>,
}

/// 解析 setup 头包 (类型 0x05)
pub(crate) fn parse_setup(packet: &[u8], channels: u32) -> LingResult<ParsedSetup> {
    let mut br = LsbBitReader::new(packet);
    let mut magic = [0u8; 7];
    br.read_bytes(&mut magic);
    if magic[0] != 0x05 || &magic[1..] != b"vorbis" {
        return Err(LingError::InvalidData("Vorbis setup 头包标识无效".into()));
    }

    let codebook_count = br.read_bits(8) as usize + 1;
    let mut codebooks = Vec::with_capacity(codebook_count);
    for i in 0..codebook_count {
        codebooks.push(Codebook::read(&mut br).map_err(|e| {
            LingError::InvalidData(format!("Vorbis codebook {} 解析失败: {}", i, e))
        })?);
    }

    // 时域变换为历史遗留字段, 必须全零
    let transform_count = br.read_bits(6) + 1;
    for _ in 0..transform_count {
        if br.read_bits(16) != 0 {
            return Err(LingError::InvalidData(
                "Vorbis 时域变换类型必须为 0".into(),
            ));
        }
    }

    let floor_count = br.read_bits(6) as usize + 1;
    let mut floors = Vec::with_capacity(floor_count);
    for i in 0..floor_count {
        let floor_type = br.read_bits(16);
        match floor_type {
            0 => {
                return Err(LingError::Unsupported(format!(
                    "Vorbis floor {} 类型 0 不支持",
                    i,
                )));
            }
            1 => floors.push(Floor::read(&mut br, codebooks.len())?),
            _ => {
                return Err(LingError::InvalidData(format!(
                    "Vorbis floor 类型非法: {}",
                    floor_type,
                )));
            }
        }
    }

    let residue_count = br.read_bits(6) as usize + 1;
    let mut residues = Vec::with_capacity(residue_count);
    for _ in 0..residue_count {
        residues.push(Residue::read(&mut br, &codebooks)?);
    }

    let mapping_count = br.read_bits(6) as usize + 1;
    let mut mappings = Vec::with_capacity(mapping_count);
    for _ in 0..mapping_count {
        mappings.push(Mapping::read(&mut br, channels, floors.len(), residues.len())?);
    }

    let mode_count = br.read_bits(6) as usize + 1;
    let mut modes = Vec::with_capacity(mode_count);
    for _ in 0..mode_count {
        modes.push(Mode::read(&mut br, mappings.len())?);
    }

    if !br.read_flag() || br.is_end_of_packet() {
        return Err(LingError::InvalidData(
            "Vorbis setup 头包 framing_flag 非法".into(),
        ));
    }

    Ok(ParsedSetup {
        codebooks,
        floors,
        residues,
        mappings,
        modes,
    })
}
