use std::io::{Cursor, Read};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use byteorder::{BigEndian, ReadBytesExt};
use log::info;

pub const IMAGES_FILE: &str = "train-images-idx3-ubyte";
pub const LABELS_FILE: &str = "train-labels-idx1-ubyte";

const IMAGES_MAGIC: u32 = 0x803;
const LABELS_MAGIC: u32 = 0x801;
const ROWS: u32 = 28;
const COLS: u32 = 28;

/// 带标签的训练样本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledFeature {
    pub features: Vec<u8>,
    pub label: String,
}

/// 从目录中读取 MNIST 训练集
pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<LabeledFeature>> {
    let dir = dir.as_ref();
    let read = |name: &str| {
        let path = dir.join(name);
        std::fs::read(&path).with_context(|| format!("无法读取 {}", path.display()))
    };
    let images = read(IMAGES_FILE)?;
    let labels = read(LABELS_FILE)?;
    let data = parse(&images, &labels)?;
    info!("从 {} 读取了 {} 个训练样本", dir.display(), data.len());
    Ok(data)
}

/// 游标之后剩余的字节数
fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len().saturating_sub(cursor.position() as usize)
}

/// 解析 IDX 格式的图片与标签
pub fn parse(images: &[u8], labels: &[u8]) -> Result<Vec<LabeledFeature>> {
    let mut images = Cursor::new(images);
    let mut labels = Cursor::new(labels);

    let magic = images.read_u32::<BigEndian>().context("图片文件头不完整")?;
    ensure!(magic == IMAGES_MAGIC, "图片文件 magic 错误: {magic:#x}");
    let n_images = images.read_u32::<BigEndian>().context("图片文件头不完整")?;
    let rows = images.read_u32::<BigEndian>().context("图片文件头不完整")?;
    let cols = images.read_u32::<BigEndian>().context("图片文件头不完整")?;
    ensure!(rows == ROWS && cols == COLS, "图片尺寸错误: {rows}x{cols}");

    let magic = labels.read_u32::<BigEndian>().context("标签文件头不完整")?;
    ensure!(magic == LABELS_MAGIC, "标签文件 magic 错误: {magic:#x}");
    let n_labels = labels.read_u32::<BigEndian>().context("标签文件头不完整")?;

    if n_images != n_labels {
        bail!("图片数量 {n_images} 与标签数量 {n_labels} 不一致");
    }

    let size = (rows * cols) as usize;
    let n = n_images as usize;
    ensure!(
        n.checked_mul(size).is_some_and(|need| need <= remaining(&images)),
        "图片数据不完整: 文件头声明 {n} 张图片，实际只有 {} 字节",
        remaining(&images)
    );
    ensure!(
        n <= remaining(&labels),
        "标签数据不完整: 文件头声明 {n} 个标签，实际只有 {} 字节",
        remaining(&labels)
    );

    let mut data = Vec::with_capacity(n);
    for i in 0..n_images {
        let mut features = vec![0u8; size];
        images.read_exact(&mut features).with_context(|| format!("第 {i} 张图片数据不完整"))?;
        let label = labels.read_u8().with_context(|| format!("第 {i} 个标签数据不完整"))?;
        data.push(LabeledFeature { features, label: label.to_string() });
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use byteorder::WriteBytesExt;

    use super::*;

    /// 构造一个最小的 IDX 数据集，第 i 张图片所有像素都是 i
    fn sample(n: u32) -> (Vec<u8>, Vec<u8>) {
        let mut images = vec![];
        images.write_u32::<BigEndian>(IMAGES_MAGIC).unwrap();
        images.write_u32::<BigEndian>(n).unwrap();
        images.write_u32::<BigEndian>(ROWS).unwrap();
        images.write_u32::<BigEndian>(COLS).unwrap();
        let mut labels = vec![];
        labels.write_u32::<BigEndian>(LABELS_MAGIC).unwrap();
        labels.write_u32::<BigEndian>(n).unwrap();
        for i in 0..n {
            images.extend(std::iter::repeat_n(i as u8, (ROWS * COLS) as usize));
            labels.push((i % 10) as u8);
        }
        (images, labels)
    }

    #[test]
    fn parse_sample() {
        let (images, labels) = sample(3);
        let data = parse(&images, &labels).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[2].label, "2");
        assert_eq!(data[2].features, vec![2u8; 784]);
    }

    #[test]
    fn parse_rejects_bad_magic() {
        let (mut images, labels) = sample(1);
        images[3] = 0x01;
        assert!(parse(&images, &labels).is_err());
    }

    #[test]
    fn parse_rejects_count_mismatch() {
        let (images, _) = sample(2);
        let (_, labels) = sample(1);
        assert!(parse(&images, &labels).is_err());
    }

    #[test]
    fn parse_rejects_oversized_count() {
        let (mut images, mut labels) = sample(1);
        images[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        labels[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
        let err = parse(&images, &labels).unwrap_err();
        assert!(err.to_string().contains("图片数据不完整"));
    }

    #[test]
    fn parse_rejects_missing_labels() {
        let (images, labels) = sample(3);
        assert!(parse(&images, &labels[..labels.len() - 1]).is_err());
    }

    #[test]
    fn parse_rejects_truncated() {
        let (images, labels) = sample(2);
        assert!(parse(&images[..images.len() - 1], &labels).is_err());
    }
}
