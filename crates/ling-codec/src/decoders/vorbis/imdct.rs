//! 逆 MDCT (inverse modified discrete cosine transform).
//!
//! 采用多速率滤波器组分解 (Duhamel, Mahieux, Petit,
//! "The use of multirate filter banks for coding of high quality digital
//! audio", 1992): 预计算 A[N/2]、B[N/2]、C[N/4] 三组旋转因子,
//! 经反射、两级蝶形、radix-2 抽取加位反转、最终加权折叠共八个阶段,
//! 由 N/2 个频谱样本原位产出 N 个时域样本.

/// 逆 MDCT 计算器, 每档块大小一个实例
pub struct Imdct {
    /// 块大小 N
    n: usize,
    n2: usize,
    n4: usize,
    n8: usize,
    /// 3N/4
    n43: usize,
    /// log2(N)
    ldn: u32,
    a: Vec<f32>,
    b: Vec<f32>,
    c: Vec<f32>,
    /// 中间缓冲, 长 N
    buf: Vec<f32>,
}

/// 按位翻转的字节查找表
#[rustfmt::skip]
const REVERSE_BYTES: [u8; 256] = [
    0x00, 0x80, 0x40, 0xC0, 0x20, 0xA0, 0x60, 0xE0, 0x10, 0x90, 0x50, 0xD0, 0x30, 0xB0, 0x70, 0xF0,
    0x08, 0x88, 0x48, 0xC8, 0x28, 0xA8, 0x68, 0xE8, 0x18, 0x98, 0x58, 0xD8, 0x38, 0xB8, 0x78, 0xF8,
    0x04, 0x84, 0x44, 0xC4, 0x24, 0xA4, 0x64, 0xE4, 0x14, 0x94, 0x54, 0xD4, 0x34, 0xB4, 0x74, 0xF4,
    0x0C, 0x8C, 0x4C, 0xCC, 0x2C, 0xAC, 0x6C, 0xEC, 0x1C, 0x9C, 0x5C, 0xDC, 0x3C, 0xBC, 0x7C, 0xFC,
    0x02, 0x82, 0x42, 0xC2, 0x22, 0xA2, 0x62, 0xE2, 0x12, 0x92, 0x52, 0xD2, 0x32, 0xB2, 0x72, 0xF2,
    0x0A, 0x8A, 0x4A, 0xCA, 0x2A, 0xAA, 0x6A, 0xEA, 0x1A, 0x9A, 0x5A, 0xDA, 0x3A, 0xBA, 0x7A, 0xFA,
    0x06, 0x86, 0x46, 0xC6, 0x26, 0xA6, 0x66, 0xE6, 0x16, 0x96, 0x56, 0xD6, 0x36, 0xB6, 0x76, 0xF6,
    0x0E, 0x8E, 0x4E, 0xCE, 0x2E, 0xAE, 0x6E, 0xEE, 0x1E, 0x9E, 0x5E, 0xDE, 0x3E, 0xBE, 0x7E, 0xFE,
    0x01, 0x81, 0x41, 0xC1, 0x21, 0xA1, 0x61, 0xE1, 0x11, 0x91, 0x51, 0xD1, 0x31, 0xB1, 0x71, 0xF1,
    0x09, 0x89, 0x49, 0xC9, 0x29, 0xA9, 0x69, 0xE9, 0x19, 0x99, 0x59, 0xD9, 0x39, 0xB9, 0x79, 0xF9,
    0x05, 0x85, 0x45, 0xC5, 0x25, 0xA5, 0x65, 0xE5, 0x15, 0x95, 0x55, 0xD5, 0x35, 0xB5, 0x75, 0xF5,
    0x0D, 0x8D, 0x4D, 0xCD, 0x2D, 0xAD, 0x6D, 0xED, 0x1D, 0x9D, 0x5D, 0xDD, 0x3D, 0xBD, 0x7D, 0xFD,
    0x03, 0x83, 0x43, 0xC3, 0x23, 0xA3, 0x63, 0xE3, 0x13, 0x93, 0x53, 0xD3, 0x33, 0xB3, 0x73, 0xF3,
    0x0B, 0x8B, 0x4B, 0xCB, 0x2B, 0xAB, 0x6B, 0xEB, 0x1B, 0x9B, 0x5B, 0xDB, 0x3B, 0xBB, 0x7B, 0xFB,
    0x07, 0x87, 0x47, 0xC7, 0x27, 0xA7, 0x67, 0xE7, 0x17, 0x97, 0x57, 0xD7, 0x37, 0xB7, 0x77, 0xF7,
    0x0F, 0x8F, 0x4F, 0xCF, 0x2F, 0xAF, 0x6F, 0xEF, 0x1F, 0x9F, 0x5F, 0xDF, 0x3F, 0xBF, 0x7F, 0xFF,
];

/// 翻转 `s` 的低 `bits` 位 (0 ≤ bits ≤ 32)
pub fn reverse_bits(s: u32, bits: u32) -> u32 {
    if bits == 0 {
        return 0;
    }
    let s = s << (32 - bits);
    u32::from(REVERSE_BYTES[(s >> 24) as usize])
        | u32::from(REVERSE_BYTES[(s >> 16 & 0xFF) as usize]) << 8
        | u32::from(REVERSE_BYTES[(s >> 8 & 0xFF) as usize]) << 16
        | u32::from(REVERSE_BYTES[(s & 0xFF) as usize]) << 24
}

impl Imdct {
    /// 创建块大小 N 的逆 MDCT 计算器
    ///
    /// N 必须是 2 的幂且不小于 16.
    pub fn new(n: usize) -> Self {
        assert!(n.is_power_of_two() && n >= 16, "IMDCT 不支持块大小 {}", n);

        let n2 = n / 2;
        let n4 = n / 4;
        let n8 = n / 8;
        let ldn = n.trailing_zeros();
        let pi = std::f64::consts::PI;
        let nf = n as f64;

        let mut a = vec![0.0f32; n2];
        let mut b = vec![0.0f32; n2];
        for k in 0..n4 {
            a[2 * k] = (4.0 * k as f64 * pi / nf).cos() as f32;
            a[2 * k + 1] = -((4.0 * k as f64 * pi / nf).sin()) as f32;
            b[2 * k] = ((2.0 * k as f64 + 1.0) * pi / nf / 2.0).cos() as f32;
            b[2 * k + 1] = ((2.0 * k as f64 + 1.0) * pi / nf / 2.0).sin() as f32;
        }
        let mut c = vec![0.0f32; n4];
        for k in 0..n8 {
            c[2 * k] = (2.0 * (2.0 * k as f64 + 1.0) * pi / nf).cos() as f32;
            c[2 * k + 1] = -((2.0 * (2.0 * k as f64 + 1.0) * pi / nf).sin()) as f32;
        }

        Self {
            n,
            n2,
            n4,
            n8,
            n43: 3 * n4,
            ldn,
            a,
            b,
            c,
            buf: vec![0.0f32; n],
        }
    }

    /// 块大小 N
    pub fn blocksize(&self) -> usize {
        self.n
    }

    /// 原位逆变换: x[..N/2] 为频谱输入, x[..N] 为时域输出
    pub fn inverse(&mut self, x: &mut [f32]) {
        let (n, n2, n4, n8, n43) = (self.n, self.n2, self.n4, self.n8, self.n43);
        debug_assert!(x.len() >= n);
        let buf = &mut self.buf;

        // 反射: 前半原样, 后半取负镜像
        buf[..n2].copy_from_slice(&x[..n2]);
        for k in n2..n {
            buf[k] = -x[n - k - 1];
        }

        // 第一级蝶形: buf -> x (只写奇数下标)
        let a = &self.a;
        let mut k2 = 0;
        while k2 < n2 {
            let k4 = k2 * 2;
            let d0 = buf[k4] - buf[n - k4 - 1];
            let d1 = buf[k4 + 2] - buf[n - k4 - 3];
            x[n - k4 - 1] = d0 * a[k2] - d1 * a[k2 + 1];
            x[n - k4 - 3] = d0 * a[k2 + 1] + d1 * a[k2];
            k2 += 2;
        }

        // 第二级蝶形: x -> buf
        let mut k4 = 0;
        while k4 < n2 {
            let s3 = x[n2 + 3 + k4];
            let s1 = x[n2 + 1 + k4];
            let t3 = x[k4 + 3];
            let t1 = x[k4 + 1];
            buf[n2 + 3 + k4] = s3 + t3;
            buf[n2 + 1 + k4] = s1 + t1;
            buf[k4 + 3] = (s3 - t3) * a[n2 - 4 - k4] - (s1 - t1) * a[n2 - 3 - k4];
            buf[k4 + 1] = (s1 - t1) * a[n2 - 4 - k4] + (s3 - t3) * a[n2 - 3 - k4];
            k4 += 4;
        }

        // radix-2 抽取: buf -> x, 每轮折半
        let ldn = self.ldn as usize;
        for l in 0..ldn - 3 {
            let k0 = n >> (l + 2);
            let k1 = 1usize << (l + 3);
            let rn = n >> (l + 4);
            let s2n = 1usize << (l + 2);
            for r in 0..rn {
                for s2 in (0..s2n).step_by(2) {
                    let n1s0 = n - 1 - k0 * s2 - 4 * r;
                    let n3s0 = n1s0 - 2;
                    let n1s1 = n1s0 - k0;
                    let n3s1 = n3s0 - k0;
                    let d1 = buf[n1s0] - buf[n1s1];
                    let d3 = buf[n3s0] - buf[n3s1];
                    x[n1s0] = buf[n1s0] + buf[n1s1];
                    x[n3s0] = buf[n3s0] + buf[n3s1];
                    x[n1s1] = d1 * a[r * k1] - d3 * a[r * k1 + 1];
                    x[n3s1] = d3 * a[r * k1] + d1 * a[r * k1 + 1];
                }
            }
            if l + 1 < ldn - 3 {
                buf[..n].copy_from_slice(&x[..n]);
            }
        }

        // 位反转重排: x -> buf (8 个一组)
        let rev_bits = (ldn - 3) as u32;
        for i in 0..n8 as u32 {
            let j = reverse_bits(i, rev_bits);
            if i == j {
                let i8 = (i as usize) << 3;
                buf[i8 + 1] = x[i8 + 1];
                buf[i8 + 3] = x[i8 + 3];
                buf[i8 + 5] = x[i8 + 5];
                buf[i8 + 7] = x[i8 + 7];
            } else if i < j {
                let i8 = (i as usize) << 3;
                let j8 = (j as usize) << 3;
                for off in [1, 3, 5, 7] {
                    buf[j8 + off] = x[i8 + off];
                    buf[i8 + off] = x[j8 + off];
                }
            }
        }

        // 收集奇数槽: buf -> x
        for k in 0..n2 {
            x[k] = buf[2 * k + 1];
        }

        // 交织重排: x -> buf
        for k in 0..n8 {
            buf[n - 1 - 2 * k] = x[4 * k];
            buf[n - 2 - 2 * k] = x[4 * k + 1];
            buf[n43 - 1 - 2 * k] = x[4 * k + 2];
            buf[n43 - 2 - 2 * k] = x[4 * k + 3];
        }

        // C 表旋转: buf -> x
        let c = &self.c;
        for k in 0..n8 {
            let k2 = 2 * k;
            let e0 = buf[n2 + k2];
            let e1 = buf[n2 + k2 + 1];
            let f0 = buf[n - 2 - k2];
            let f1 = buf[n - 2 - k2 + 1];
            x[n2 + k2] = (e0 + f0 + c[k2 + 1] * (e0 - f0) + c[k2] * (e1 + f1)) / 2.0;
            x[n - 2 - k2] = (e0 + f0 - c[k2 + 1] * (e0 - f0) - c[k2] * (e1 + f1)) / 2.0;
            x[n2 + 1 + k2] = (e1 - f1 + c[k2 + 1] * (e1 + f1) - c[k2] * (e0 - f0)) / 2.0;
            x[n - 1 - k2] = (-e1 + f1 + c[k2 + 1] * (e1 + f1) - c[k2] * (e0 - f0)) / 2.0;
        }

        // B 表加权: x -> buf
        let b = &self.b;
        for k in 0..n4 {
            let k2 = 2 * k;
            buf[k] = x[k2 + n2] * b[k2] + x[k2 + 1 + n2] * b[k2 + 1];
            buf[n2 - 1 - k] = x[k2 + n2] * b[k2 + 1] - x[k2 + 1 + n2] * b[k2];
        }

        // 折叠输出: buf -> x
        for k in 0..n4 {
            x[k] = buf[k + n4] * 0.5;
        }
        for k in n4..n43 {
            x[k] = -buf[n43 - k - 1] * 0.5;
        }
        for k in n43..n {
            x[k] = -buf[k - n43] * 0.5;
        }
    }
}
