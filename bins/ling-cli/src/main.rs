//! ling - Ling 音频框架命令行工具
//!
//! 提供两个子命令:
//! - `info`: 探测并打印音频文件的格式与流信息
//! - `decode`: 把 Ogg/Vorbis 输入解码为 WAV 文件

use std::io::Read;
use std::process;

use clap::{Parser, Subcommand};
use log::debug;

use ling::codec::CodecId;
use ling::core::{ChannelLayout, LingResult, Rational, SampleFormat};
use ling::format::stream::{AudioStreamParams, Stream, StreamParams};
use ling::format::{Demuxer, FormatId, IoContext, Muxer};
use ling::PcmReader;

/// Ling 音频解码命令行工具
#[derive(Parser, Debug)]
#[command(name = "ling", version, about = "纯 Rust Ogg/Vorbis 音频解码工具")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 探测并打印音频文件信息
    Info {
        /// 输入文件路径
        input: String,
    },
    /// 解码为 WAV 文件
    Decode {
        /// 输入文件路径 (Ogg/Vorbis 或 WAV)
        input: String,
        /// 输出 WAV 文件路径
        output: String,
        /// 输出采样格式: u8 / s16 / f32
        #[arg(long, default_value = "s16")]
        format: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Info { input } => run_info(&input),
        Command::Decode {
            input,
            output,
            format,
        } => run_decode(&input, &output, &format),
    };

    if let Err(e) = result {
        eprintln!("错误: {}", e);
        process::exit(1);
    }
}

/// 解析输出采样格式参数
fn parse_sample_format(name: &str) -> LingResult<SampleFormat> {
    match name {
        "u8" => Ok(SampleFormat::U8),
        "s16" => Ok(SampleFormat::S16),
        "f32" => Ok(SampleFormat::F32),
        other => Err(ling::core::LingError::InvalidArgument(format!(
            "未知的采样格式: {} (支持 u8/s16/f32)",
            other,
        ))),
    }
}

fn run_info(input: &str) -> LingResult<()> {
    let registry = ling::default_format_registry();
    let mut io = IoContext::open_read(input)?;
    let demuxer = registry.open_input(&mut io, Some(input))?;

    println!("输入: {}", input);
    println!("格式: {}", demuxer.name());
    match demuxer.duration() {
        Some(sec) => println!("时长: {:.3} 秒", sec),
        None => println!("时长: 未知"),
    }

    for stream in demuxer.streams() {
        match &stream.params {
            StreamParams::Audio(a) => {
                println!(
                    "流 #{}: {}, {} Hz, {}, {}",
                    stream.index, stream.codec_id, a.sample_rate, a.channel_layout, a.sample_format,
                );
            }
            _ => println!("流 #{}: {}", stream.index, stream.codec_id),
        }

        // Vorbis 的注释在头包里, 经解码器读出
        if stream.codec_id == CodecId::Vorbis {
            let io = IoContext::open_read(input)?;
            let reader = PcmReader::new(io, Some(input), SampleFormat::F32)?;
            for (key, value) in reader.metadata() {
                println!("  {} = {}", key, value);
            }
        }
    }

    Ok(())
}

fn run_decode(input: &str, output: &str, format: &str) -> LingResult<()> {
    let sample_format = parse_sample_format(format)?;
    let mut reader = PcmReader::open_with_format(input, sample_format)?;

    println!(
        "解码 {} -> {} ({} Hz, {} 声道, {})",
        input,
        output,
        reader.sample_rate(),
        reader.channels(),
        reader.sample_format(),
    );

    let codec_id = match sample_format {
        SampleFormat::U8 => CodecId::PcmU8,
        SampleFormat::F32 => CodecId::PcmF32le,
        _ => CodecId::PcmS16le,
    };
    let stream = Stream {
        index: 0,
        codec_id,
        time_base: Rational::new(1, reader.sample_rate() as i32),
        duration: 0,
        nb_frames: 0,
        extra_data: Vec::new(),
        params: StreamParams::Audio(AudioStreamParams {
            sample_rate: reader.sample_rate(),
            channel_layout: ChannelLayout::from_channels(reader.channels()),
            sample_format,
            bit_rate: 0,
            frame_size: 0,
        }),
        metadata: Vec::new(),
    };

    let registry = ling::default_format_registry();
    let mut muxer = registry.create_muxer(FormatId::Wav)?;
    let mut out_io = IoContext::open_write(output)?;
    muxer.write_header(&mut out_io, &[stream])?;

    let mut total = 0u64;
    let mut buf = vec![0u8; 32 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let pkt = ling::codec::Packet::from_data(buf[..n].to_vec());
        muxer.write_packet(&mut out_io, &pkt)?;
        total += n as u64;
    }
    muxer.write_trailer(&mut out_io)?;

    debug!("共写入 {} 字节 PCM", total);
    println!("完成: {} 字节 PCM", total);
    Ok(())
}
