//! Vorbis 时域合成: 声道工作区、斜坡窗与重叠相加.
//!
//! 每个声道持有一对乒乓音频缓冲: residue 解码与 IMDCT 始终写入
//! "当前"一侧, 上一侧保留上个块的时域输出, 重叠相加时取其后半块
//! 与当前块前半做加窗混合. 乒乓通过下标翻转完成, 不做指针别名.

/// 单声道解码工作区
///
/// 全部缓冲在 setup 阶段按最大块 B1 一次分配, 稳态解码不再分配.
pub(crate) struct ChannelState {
    /// floor 曲线 (线性幅度域), 长 B1/2
    pub(crate) floor: Vec<f32>,
    /// 本块 floor 未使用 (静音声道)
    pub(crate) floor_unused: bool,
    /// floor1 各控制点解码出的 y 值
    pub(crate) floor_y: Vec<i32>,
    /// floor1 邻居预测修正后的 y 值
    pub(crate) floor_final_y: Vec<i32>,
    /// floor1 各控制点是否参与画线
    pub(crate) floor_step2: Vec<bool>,
    /// 乒乓时域缓冲, 各长 B1; 前半作 residue 频谱区, IMDCT 原位展开
    pub(crate) audio: [Vec<f32>; 2],
    /// 重叠相加输出, 长 B1/2
    pub(crate) pcm: Vec<f32>,
}

impl ChannelState {
    /// 按最大块大小 B1 分配声道工作区
    pub(crate) fn new(blocksize1: usize) -> Self {
        Self {
            floor: vec![0.0; blocksize1 / 2],
            floor_unused: false,
            floor_y: Vec::with_capacity(65),
            floor_final_y: Vec::with_capacity(65),
            floor_step2: Vec::with_capacity(65),
            audio: [vec![0.0; blocksize1], vec![0.0; blocksize1]],
            pcm: vec![0.0; blocksize1 / 2],
        }
    }
}

/// 重叠描述子
///
/// 以 (上一块窗标志, 当前块窗标志) 索引, 共四种组合.
/// w0/w1 为上一块/当前块的半块长, sw 为斜坡宽度 (两者较小半块的一半),
/// a0/a1 为两侧的平直偏移, num_pcm 为本次输出的样本数.
///
/// ```text
///   |<------- w0 ------->|
///   +========+     +=====|==+
///   |        |\   /      |  |
///   0       a0 \ /       |  |
///               +        |  |
///       0   a1 / \       |  |
///       |    |/   \      |  |
///       +====+     +=====+  |
///       |<------- w1 ------>|
/// ```
#[derive(Debug, Clone, Copy)]
pub(crate) struct Overlap {
    /// 斜坡宽度
    pub(crate) sw: usize,
    /// 所用斜坡窗的块标志 (0 = 短窗)
    pub(crate) slope: usize,
    /// 上一块侧平直偏移
    pub(crate) a0: usize,
    /// 当前块侧平直偏移
    pub(crate) a1: usize,
    /// 当前块半块长
    pub(crate) w1: usize,
    /// 本次输出 PCM 样本数
    pub(crate) num_pcm: usize,
}

/// 计算一档块大小的斜坡窗: sin(π/2 · sin²(π(n+1/2)/N))
pub(crate) fn build_slope(blocksize: usize) -> Vec<f32> {
    let half = blocksize / 2;
    let mut slope = Vec::with_capacity(half);
    for n in 0..half {
        let a = ((n as f64 + 0.5) / blocksize as f64 * std::f64::consts::PI).sin();
        slope.push((0.5 * std::f64::consts::PI * a * a).sin() as f32);
    }
    slope
}

/// 构造四个重叠描述子, 以 [上一块窗标志][当前块窗标志] 索引
pub(crate) fn build_overlaps(blocksize: [usize; 2]) -> [[Overlap; 2]; 2] {
    let half = [blocksize[0] / 2, blocksize[1] / 2];
    let make = |prev: usize, cur: usize| {
        let w0 = half[prev];
        let w1 = half[cur];
        let sw = w0.min(w1);
        Overlap {
            sw,
            slope: prev.min(cur),
            a0: (w0 / 2).saturating_sub(w1 / 2),
            a1: (w1 / 2).saturating_sub(w0 / 2),
            w1,
            num_pcm: w0 / 2 + w1 / 2,
        }
    };
    [
        [make(0, 0), make(0, 1)],
        [make(1, 0), make(1, 1)],
    ]
}

/// 重叠相加
///
/// `prev_tail` 为上一块时域输出的后半块 (长 w0), `cur` 为当前块
/// 时域输出 (至少 w1 长), 结果写入 `out[..num_pcm]`:
/// 先复制 a0 个未加窗样本, 再做 sw 个斜坡交叉渐变, 余下取自当前块.
pub(crate) fn overlap_add(
    ov: &Overlap,
    slope: &[f32],
    out: &mut [f32],
    prev_tail: &[f32],
    cur: &[f32],
) {
    out[..ov.a0].copy_from_slice(&prev_tail[..ov.a0]);
    let l = &prev_tail[ov.a0..];
    let r = &cur[ov.a1..];
    for i in 0..ov.sw {
        out[ov.a0 + i] = l[i] * slope[ov.sw - 1 - i] + r[i] * slope[i];
    }
    let k = ov.w1 - (ov.a1 + ov.sw);
    out[ov.a0 + ov.sw..ov.a0 + ov.sw + k].copy_from_slice(&r[ov.sw..ov.sw + k]);
}

/// 声道耦合逆变换: 由 (幅度, 角度) 恢复两声道残差
///
/// 符号组合决定恢复方式, 与正向耦合互逆.
pub(crate) fn inverse_coupling(mag: &mut [f32], ang: &mut [f32], n: usize) {
    for i in 0..n {
        let m = mag[i];
        let a = ang[i];
        if m > 0.0 {
            if a > 0.0 {
                ang[i] = m - a;
            } else {
                ang[i] = m;
                mag[i] = m + a;
            }
        } else if a > 0.0 {
            ang[i] = m + a;
        } else {
            ang[i] = m;
            mag[i] = m - a;
        }
    }
}

/// 逐点乘法: residue 与 floor 曲线相乘得到 MDCT 系数
pub(crate) fn dot_product(a: &mut [f32], b: &[f32], n: usize) {
    for i in 0..n {
        a[i] *= b[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 正向耦合 (编码端变换), 与 inverse_coupling 互逆
    fn forward_coupling(mag: &mut [f32], ang: &mut [f32]) {
        for i in 0..mag.len() {
            let m = mag[i];
            let a = ang[i];
            if m > 0.0 {
                if a < m {
                    mag[i] = m;
                    ang[i] = m - a;
                } else {
                    mag[i] = a;
                    ang[i] = m - a;
                }
            } else if a > m {
                mag[i] = m;
                ang[i] = a - m;
            } else {
                mag[i] = a;
                ang[i] = a - m;
            }
        }
    }

    #[test]
    fn test_耦合正逆互逆() {
        // 遍历符号与大小的各种组合
        let cases: Vec<(f32, f32)> = vec![
            (0.5, 0.25),
            (0.25, 0.5),
            (0.5, -0.25),
            (-0.5, 0.25),
            (-0.25, -0.5),
            (-0.5, -0.25),
            (0.0, 0.0),
            (0.0, 1.0),
            (1.0, 0.0),
            (0.0, -1.0),
            (-1.0, 0.0),
            (3.75, 3.75),
            (-2.5, -2.5),
            (1.0, 5.0),
            (-4.0, -5.0),
        ];
        for &(x, y) in &cases {
            let mut mag = [x];
            let mut ang = [y];
            forward_coupling(&mut mag, &mut ang);
            inverse_coupling(&mut mag, &mut ang, 1);
            assert_eq!(
                (mag[0], ang[0]),
                (x, y),
                "耦合往返未恢复原值: ({}, {})",
                x,
                y,
            );
        }
        // 再用确定性伪随机数据扫一遍
        let mut state = 0x2545F491_4F6CDD1Du64;
        for _ in 0..1000 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = ((state >> 40) as i32 - (1 << 23)) as f32 / 1024.0;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = ((state >> 40) as i32 - (1 << 23)) as f32 / 1024.0;
            let mut mag = [x];
            let mut ang = [y];
            forward_coupling(&mut mag, &mut ang);
            inverse_coupling(&mut mag, &mut ang, 1);
            assert_eq!((mag[0], ang[0]), (x, y));
        }
    }

    #[test]
    fn test_斜坡窗端点与对称() {
        let slope = build_slope(256);
        assert_eq!(slope.len(), 128);
        assert!(slope[0] > 0.0 && slope[0] < 0.01);
        assert!(slope[127] > 0.999);
        // 幅度互补: s[n]² + s[N/2-1-n]² = 1
        for n in 0..128 {
            let sum = slope[n] * slope[n] + slope[127 - n] * slope[127 - n];
            assert!((sum - 1.0).abs() < 1e-5, "n={} 幅度不互补: {}", n, sum);
        }
    }

    #[test]
    fn test_重叠描述子() {
        let ov = build_overlaps([256, 2048]);
        // 短短
        assert_eq!(ov[0][0].sw, 128);
        assert_eq!(ov[0][0].a0, 0);
        assert_eq!(ov[0][0].a1, 0);
        assert_eq!(ov[0][0].num_pcm, 128);
        // 短长
        assert_eq!(ov[0][1].sw, 128);
        assert_eq!(ov[0][1].slope, 0);
        assert_eq!(ov[0][1].a0, 0);
        assert_eq!(ov[0][1].a1, 512 - 64);
        assert_eq!(ov[0][1].num_pcm, 64 + 512);
        // 长短
        assert_eq!(ov[1][0].sw, 128);
        assert_eq!(ov[1][0].a0, 512 - 64);
        assert_eq!(ov[1][0].a1, 0);
        assert_eq!(ov[1][0].num_pcm, 512 + 64);
        // 长长
        assert_eq!(ov[1][1].sw, 1024);
        assert_eq!(ov[1][1].slope, 1);
        assert_eq!(ov[1][1].num_pcm, 1024);
    }

    #[test]
    fn test_重叠相加_同窗恒等() {
        // 上一块后半与当前块前半互补加窗后相加, 常数输入应还原常数
        let n = 64usize;
        let slope = build_slope(n);
        let ov = build_overlaps([n, n])[0][0];
        // 构造一对"上块尾部已加窗"与"当前块头部已加窗"的互补数据
        let prev_tail: Vec<f32> = (0..n / 2).map(|i| slope[n / 2 - 1 - i]).collect();
        let cur: Vec<f32> = (0..n / 2).map(|i| slope[i]).collect();
        let mut out = vec![0.0f32; ov.num_pcm];
        overlap_add(&ov, &slope, &mut out, &prev_tail, &cur);
        for (i, &v) in out.iter().enumerate() {
            assert!((v - 1.0).abs() < 1e-5, "i={} 幅度={}", i, v);
        }
    }
}
