//! Vorbis floor (type 1) 解码.
//!
//! floor 是对数幅度域中的分段线性频谱包络. 配置阶段记录分区结构与
//! 各 class 的 codebook; 每个音频包中先解出各控制点的 y 值, 经邻居
//! 预测修正与钳位后, 用整数 DDA 画线合成包络曲线, 最后查逆 dB 表
//! 转回线性幅度域, 使 residue 域的乘法等价于对数域的加法.
//!
//! 本实现只支持 floor type 1; type 0 在 setup 解析处拒绝.

use ling_core::{LingError, LingResult};

use super::bitreader::{LsbBitReader, ilog};
use super::codebook::Codebook;
use super::synthesis::ChannelState;

/// 控制点数上限: 31 个分区 * 8 维 + 2 个隐式端点
const MAX_FLOOR_VALUES: usize = 65;

/// multiplier 对应的 y 值范围表
const RANGE_TABLE: [i32; 4] = [256, 128, 86, 64];

/// floor type 1 配置
#[derive(Debug, Clone)]
pub(crate) struct Floor {
    /// 每个分区所属的 class
    partition_classes: Vec<u8>,
    /// 每个 class 的维数 (1..=8)
    class_dimensions: Vec<u8>,
    /// 每个 class 的子类位数 (0..=3)
    class_subclasses: Vec<u8>,
    /// 每个 class 的主 codebook (子类位数为 0 时不使用)
    class_masterbooks: Vec<u8>,
    /// 每个 class 的子类 codebook 表, -1 表示该子类无书
    subclass_books: Vec<Vec<i32>>,
    /// y 值放大倍数 (1..=4)
    multiplier: u32,
    /// 控制点 x 坐标, 前两项为隐式的 0 与 2^rangebits
    x_list: Vec<u32>,
    /// x_list 按 x 升序的下标排列
    sorted_order: Vec<usize>,
    /// 从第 2 个点起, 每个点的 (low, high) 邻居下标
    neighbors: Vec<(usize, usize)>,
}

impl Floor {
    /// 从 setup 头包解析一个 floor1 配置
    pub(crate) fn read(br: &mut LsbBitReader<'_>, codebook_count: usize) -> LingResult<Self> {
        let partitions = br.read_bits(5) as usize;
        let mut partition_classes = Vec::with_capacity(partitions);
        let mut maximum_class = 0usize;
        for _ in 0..partitions {
            let class = br.read_bits(4) as u8;
            maximum_class = maximum_class.max(class as usize + 1);
            partition_classes.push(class);
        }

        let mut class_dimensions = vec![0u8; maximum_class];
        let mut class_subclasses = vec![0u8; maximum_class];
        let mut class_masterbooks = vec![0u8; maximum_class];
        let mut subclass_books = vec![Vec::new(); maximum_class];
        for class in 0..maximum_class {
            class_dimensions[class] = (br.read_bits(3) + 1) as u8;
            let subclasses = br.read_bits(2) as u8;
            class_subclasses[class] = subclasses;
            if subclasses > 0 {
                let masterbook = br.read_bits(8);
                if masterbook as usize >= codebook_count {
                    return Err(LingError::InvalidData(
                        "Vorbis floor1 masterbook 索引越界".into(),
                    ));
                }
                class_masterbooks[class] = masterbook as u8;
            }
            let book_count = 1usize << subclasses;
            let mut books = Vec::with_capacity(book_count);
            for _ in 0..book_count {
                let book = br.read_bits(8) as i32 - 1;
                if book >= codebook_count as i32 {
                    return Err(LingError::InvalidData(
                        "Vorbis floor1 子类 codebook 索引越界".into(),
                    ));
                }
                books.push(book);
            }
            subclass_books[class] = books;
        }

        let multiplier = br.read_bits(2) + 1;
        let range_bits = br.read_bits(4);

        let mut x_list = vec![0u32, 1u32 << range_bits];
        for &class in &partition_classes {
            for _ in 0..class_dimensions[class as usize] {
                x_list.push(br.read_bits(range_bits));
            }
        }
        if x_list.len() > MAX_FLOOR_VALUES {
            return Err(LingError::InvalidData(format!(
                "Vorbis floor1 控制点过多: {}",
                x_list.len(),
            )));
        }
        // x 坐标必须互不相同
        let mut sorted_order: Vec<usize> = (0..x_list.len()).collect();
        sorted_order.sort_by_key(|&i| x_list[i]);
        for pair in sorted_order.windows(2) {
            if x_list[pair[0]] == x_list[pair[1]] {
                return Err(LingError::InvalidData(
                    "Vorbis floor1 控制点 x 坐标重复".into(),
                ));
            }
        }

        // 预计算邻居: 点 i 的 low/high 邻居取自前 i 个点中
        // x 值小于/大于 x[i] 的最近者
        let mut neighbors = Vec::with_capacity(x_list.len().saturating_sub(2));
        for i in 2..x_list.len() {
            neighbors.push((low_neighbor(&x_list, i), high_neighbor(&x_list, i)));
        }

        Ok(Self {
            partition_classes,
            class_dimensions,
            class_subclasses,
            class_masterbooks,
            subclass_books,
            multiplier,
            x_list,
            sorted_order,
            neighbors,
        })
    }

    /// 解码一个音频包中单个声道的 floor 曲线
    ///
    /// 曲线写入 `chan.floor[..n]` (线性幅度域), n 为半块长.
    /// 返回 false 表示本块该声道 floor 未使用 (静音), 曲线未写入.
    pub(crate) fn decode(
        &self,
        br: &mut LsbBitReader<'_>,
        codebooks: &[Codebook],
        chan: &mut ChannelState,
        n: usize,
    ) -> LingResult<bool> {
        if !br.read_flag() {
            return Ok(false);
        }

        let range = RANGE_TABLE[self.multiplier as usize - 1];
        let y_bits = ilog(range as u32 - 1);

        // 头两个控制点直接读取
        let y = &mut chan.floor_y;
        y.clear();
        y.push(br.read_bits(y_bits) as i32);
        y.push(br.read_bits(y_bits) as i32);

        // 其余按分区经 classbook / 子类 codebook 解码.
        // 中途遇到包尾时本声道 floor 未使用 (静音), 不是错误.
        for &class in &self.partition_classes {
            if br.is_end_of_packet() {
                return Ok(false);
            }
            let class = class as usize;
            let cdim = self.class_dimensions[class] as usize;
            let cbits = self.class_subclasses[class] as u32;
            let csub = (1u32 << cbits) - 1;
            let mut cval = 0u32;
            if cbits > 0 {
                cval = codebooks[self.class_masterbooks[class] as usize].decode_scalar(br)?;
            }
            for _ in 0..cdim {
                let book = self.subclass_books[class][(cval & csub) as usize];
                cval >>= cbits;
                if book >= 0 {
                    y.push(codebooks[book as usize].decode_scalar(br)? as i32);
                } else {
                    y.push(0);
                }
            }
        }

        // 振幅合成: 以已确定的邻居点做线性预测, 差值还原真实 y
        let final_y = &mut chan.floor_final_y;
        let step2 = &mut chan.floor_step2;
        final_y.clear();
        step2.clear();
        final_y.push(y[0]);
        final_y.push(y[1]);
        step2.push(true);
        step2.push(true);
        for i in 2..self.x_list.len() {
            let (low, high) = self.neighbors[i - 2];
            let predicted = render_point(
                self.x_list[low] as i32,
                final_y[low],
                self.x_list[high] as i32,
                final_y[high],
                self.x_list[i] as i32,
            );
            let val = y[i];
            let highroom = range - predicted;
            let lowroom = predicted;
            let room = highroom.min(lowroom) * 2;
            if val != 0 {
                step2[low] = true;
                step2[high] = true;
                step2.push(true);
                final_y.push(if val >= room {
                    if highroom > lowroom {
                        val - lowroom + predicted
                    } else {
                        predicted - val + highroom - 1
                    }
                } else if val % 2 == 1 {
                    predicted - (val + 1) / 2
                } else {
                    predicted + val / 2
                });
            } else {
                step2.push(false);
                final_y.push(predicted);
            }
        }
        for v in final_y.iter_mut() {
            *v = (*v).clamp(0, range - 1);
        }

        // 曲线合成: 按 x 升序画线段, 未置 step2 标志的点不参与
        let mult = self.multiplier as i32;
        let out = &mut chan.floor[..n];
        let mut lx = 0i32;
        let mut ly = final_y[self.sorted_order[0]] * mult;
        let mut hx = 0i32;
        let mut hy = ly;
        for &si in &self.sorted_order[1..] {
            if step2[si] {
                hy = final_y[si] * mult;
                hx = self.x_list[si] as i32;
                render_line(lx, ly, hx, hy, out);
                lx = hx;
                ly = hy;
            }
        }
        if (hx as usize) < n {
            // 最后一点之后补水平线段
            render_line(hx, hy, n as i32, hy, out);
        }

        Ok(true)
    }
}

/// 前 i 个点中 x 小于 x[i] 的最近点下标
fn low_neighbor(v: &[u32], i: usize) -> usize {
    let mut best = 0;
    for (n, &x) in v.iter().enumerate().take(i) {
        if x < v[i] && x >= v[best] {
            best = n;
        }
    }
    best
}

/// 前 i 个点中 x 大于 x[i] 的最近点下标
fn high_neighbor(v: &[u32], i: usize) -> usize {
    let mut best = 1;
    for (n, &x) in v.iter().enumerate().take(i) {
        if x > v[i] && x <= v[best] {
            best = n;
        }
    }
    best
}

/// 线段上整数点的 y 坐标 (不做舍入的整数插值)
fn render_point(x0: i32, y0: i32, x1: i32, y1: i32, x: i32) -> i32 {
    let dy = y1 - y0;
    let adx = x1 - x0;
    let ady = dy.abs();
    let err = ady * (x - x0);
    let off = err / adx;
    if dy < 0 { y0 - off } else { y0 + off }
}

/// 整数 DDA 画线, 结果经逆 dB 表写入 out[x0..min(x1, len)]
fn render_line(x0: i32, y0: i32, x1: i32, y1: i32, out: &mut [f32]) {
    let dy = y1 - y0;
    let adx = x1 - x0;
    let mut ady = dy.abs();
    let base = dy / adx;
    let sy = if dy < 0 { base - 1 } else { base + 1 };
    ady -= base.abs() * adx;

    if x0 as usize >= out.len() {
        return;
    }
    let mut y = y0;
    let mut err = 0;
    out[x0 as usize] = INVERSE_DB_TABLE[y.clamp(0, 255) as usize];
    for x in x0 + 1..x1.min(out.len() as i32) {
        err += ady;
        if err >= adx {
            err -= adx;
            y += sy;
        } else {
            y += base;
        }
        out[x as usize] = INVERSE_DB_TABLE[y.clamp(0, 255) as usize];
    }
}

/// 逆 dB 查找表 (Vorbis I 规范 §7.2.4), 256 级对数幅度到线性幅度
#[rustfmt::skip]
static INVERSE_DB_TABLE: [f32; 256] = [
    1.0649863e-07, 1.1341951e-07, 1.2079015e-07, 1.2863978e-07,
    1.3699951e-07, 1.4590251e-07, 1.5538408e-07, 1.6548181e-07,
    1.7623575e-07, 1.8768855e-07, 1.9988561e-07, 2.1287530e-07,
    2.2670913e-07, 2.4144197e-07, 2.5713223e-07, 2.7384213e-07,
    2.9163793e-07, 3.1059021e-07, 3.3077411e-07, 3.5226968e-07,
    3.7516214e-07, 3.9954229e-07, 4.2550680e-07, 4.5315863e-07,
    4.8260743e-07, 5.1396998e-07, 5.4737065e-07, 5.8294187e-07,
    6.2082472e-07, 6.6116941e-07, 7.0413592e-07, 7.4989464e-07,
    7.9862701e-07, 8.5052630e-07, 9.0579828e-07, 9.6466216e-07,
    1.0273513e-06, 1.0941144e-06, 1.1652161e-06, 1.2409384e-06,
    1.3215816e-06, 1.4074654e-06, 1.4989305e-06, 1.5963394e-06,
    1.7000785e-06, 1.8105592e-06, 1.9282195e-06, 2.0535261e-06,
    2.1869758e-06, 2.3290978e-06, 2.4804557e-06, 2.6416497e-06,
    2.8133190e-06, 2.9961443e-06, 3.1908506e-06, 3.3982101e-06,
    3.6190449e-06, 3.8542308e-06, 4.1047004e-06, 4.3714470e-06,
    4.6555282e-06, 4.9580707e-06, 5.2802740e-06, 5.6234160e-06,
    5.9888572e-06, 6.3780469e-06, 6.7925283e-06, 7.2339451e-06,
    7.7040476e-06, 8.2047000e-06, 8.7378876e-06, 9.3057248e-06,
    9.9104632e-06, 1.0554501e-05, 1.1240392e-05, 1.1970856e-05,
    1.2748789e-05, 1.3577278e-05, 1.4459606e-05, 1.5399272e-05,
    1.6400004e-05, 1.7465768e-05, 1.8600792e-05, 1.9809576e-05,
    2.1096914e-05, 2.2467911e-05, 2.3928002e-05, 2.5482978e-05,
    2.7139006e-05, 2.8902651e-05, 3.0780908e-05, 3.2781225e-05,
    3.4911534e-05, 3.7180282e-05, 3.9596466e-05, 4.2169667e-05,
    4.4910090e-05, 4.7828601e-05, 5.0936773e-05, 5.4246931e-05,
    5.7772202e-05, 6.1526565e-05, 6.5524908e-05, 6.9783085e-05,
    7.4317983e-05, 7.9147585e-05, 8.4291040e-05, 8.9768747e-05,
    9.5602426e-05, 0.00010181521, 0.00010843174, 0.00011547824,
    0.00012298267, 0.00013097477, 0.00013948625, 0.00014855085,
    0.00015820453, 0.00016848555, 0.00017943469, 0.00019109536,
    0.00020351382, 0.00021673929, 0.00023082423, 0.00024582449,
    0.00026179955, 0.00027881276, 0.00029693158, 0.00031622787,
    0.00033677814, 0.00035866388, 0.00038197188, 0.00040679456,
    0.00043323036, 0.00046138411, 0.00049136745, 0.00052329927,
    0.00055730621, 0.00059352311, 0.00063209358, 0.00067317058,
    0.00071691700, 0.00076350630, 0.00081312324, 0.00086596457,
    0.00092223983, 0.00098217216, 0.0010459992,  0.0011139742,
    0.0011863665,  0.0012634633,  0.0013455702,  0.0014330129,
    0.0015261382,  0.0016253153,  0.0017309374,  0.0018434235,
    0.0019632195,  0.0020908006,  0.0022266726,  0.0023713743,
    0.0025254795,  0.0026895994,  0.0028643847,  0.0030505286,
    0.0032487691,  0.0034598925,  0.0036847358,  0.0039241906,
    0.0041792066,  0.0044507950,  0.0047400328,  0.0050480668,
    0.0053761186,  0.0057254891,  0.0060975636,  0.0064938176,
    0.0069158225,  0.0073652516,  0.0078438871,  0.0083536271,
    0.0088964928,  0.009474637,   0.010090352,   0.010746080,
    0.011444421,   0.012188144,   0.012980198,   0.013823725,
    0.014722068,   0.015678791,   0.016697687,   0.017782797,
    0.018938423,   0.020169149,   0.021479854,   0.022875735,
    0.024362330,   0.025945531,   0.027631618,   0.029427276,
    0.031339626,   0.033376252,   0.035545228,   0.037855157,
    0.040315199,   0.042935108,   0.045725273,   0.048696758,
    0.051861348,   0.055231591,   0.058820850,   0.062643361,
    0.066714279,   0.071049749,   0.075666962,   0.080584227,
    0.085821044,   0.091398179,   0.097337747,   0.10366330,
    0.11039993,    0.11757434,    0.12521498,    0.13335215,
    0.14201813,    0.15124727,    0.16107617,    0.17154380,
    0.18269168,    0.19456402,    0.20720788,    0.22067342,
    0.23501402,    0.25028656,    0.26655159,    0.28387361,
    0.30232132,    0.32196786,    0.34289114,    0.36517414,
    0.38890521,    0.41417847,    0.44109412,    0.46975890,
    0.50028648,    0.53279791,    0.56742212,    0.60429640,
    0.64356699,    0.68538959,    0.72993007,    0.77736504,
    0.82788260,    0.88168307,    0.93897980,    1.0,
];
