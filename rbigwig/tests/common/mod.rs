//! Builds small bigWig files in memory for tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use libdeflater::{CompressionLvl, Compressor};

pub const BIGWIG_MAGIC: u32 = 0x888F_FC26;
pub const BIGBED_MAGIC: u32 = 0x8789_F2EB;
const CHROM_TREE_MAGIC: u32 = 0x78CA_8C91;
const CIR_TREE_MAGIC: u32 = 0x2468_ACE0;

/// Byte offsets of header fields, for corrupting files
pub const FULL_INDEX_OFFSET_FIELD: usize = 24;
pub const VERSION_FIELD: usize = 4;

pub enum Items {
    BedGraph(Vec<(u32, u32, f32)>),
    VarStep {
        span: u32,
        items: Vec<(u32, f32)>,
    },
    FixedStep {
        start: u32,
        step: u32,
        span: u32,
        values: Vec<f32>,
    },
}

impl Items {
    /// The `(start, end, value)` of every item
    pub fn intervals(&self) -> Vec<(u32, u32, f32)> {
        match self {
            Items::BedGraph(items) => items.clone(),
            Items::VarStep { span, items } => {
                items.iter().map(|&(s, v)| (s, s + span, v)).collect()
            }
            Items::FixedStep {
                start,
                step,
                span,
                values,
            } => values
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let s = start + i as u32 * step;
                    (s, s + span, v)
                })
                .collect(),
        }
    }
}

pub struct Section {
    pub chrom: u32,
    pub items: Items,
}

#[derive(Copy, Clone, Debug)]
pub struct ZoomItem {
    pub chrom: u32,
    pub start: u32,
    pub end: u32,
    pub valid_count: u32,
    pub min: f32,
    pub max: f32,
    pub sum: f32,
    pub sum_squares: f32,
}

#[derive(Copy, Clone)]
struct IndexItem {
    start_chrom: u32,
    start_base: u32,
    end_chrom: u32,
    end_base: u32,
    offset: u64,
    size: u64,
}

struct Out {
    data: Vec<u8>,
    big: bool,
}

impl Out {
    fn new(big: bool) -> Self {
        Out { data: vec![], big }
    }

    fn pos(&self) -> u64 {
        self.data.len() as u64
    }

    fn u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn u16(&mut self, v: u16) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.data.extend_from_slice(&b);
    }

    fn u32(&mut self, v: u32) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.data.extend_from_slice(&b);
    }

    fn u64(&mut self, v: u64) {
        let b = if self.big { v.to_be_bytes() } else { v.to_le_bytes() };
        self.data.extend_from_slice(&b);
    }

    fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    fn f64(&mut self, v: f64) {
        self.u64(v.to_bits());
    }
}

pub struct BigWigBuilder {
    pub big_endian: bool,
    pub compressed: bool,
    pub version: u16,
    pub magic: u32,
    pub total_summary: bool,
    pub chroms: Vec<(String, u32)>,
    pub chrom_leaf_size: usize,
    pub sections: Vec<Section>,
    pub items_per_leaf: usize,
    pub zooms: Vec<(u32, Vec<ZoomItem>)>,
    pub zoom_items_per_block: usize,
}

impl BigWigBuilder {
    pub fn new(chroms: &[(&str, u32)]) -> Self {
        BigWigBuilder {
            big_endian: false,
            compressed: true,
            version: 4,
            magic: BIGWIG_MAGIC,
            total_summary: true,
            chroms: chroms.iter().map(|&(n, l)| (n.to_owned(), l)).collect(),
            chrom_leaf_size: 256,
            sections: vec![],
            items_per_leaf: 64,
            zooms: vec![],
            zoom_items_per_block: 4,
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn uncompressed(mut self) -> Self {
        self.compressed = false;
        self
    }

    pub fn items_per_leaf(mut self, items_per_leaf: usize) -> Self {
        self.items_per_leaf = items_per_leaf;
        self
    }

    pub fn chrom_leaf_size(mut self, chrom_leaf_size: usize) -> Self {
        self.chrom_leaf_size = chrom_leaf_size;
        self
    }

    pub fn bedgraph(mut self, chrom: u32, items: &[(u32, u32, f32)]) -> Self {
        self.sections.push(Section {
            chrom,
            items: Items::BedGraph(items.to_vec()),
        });
        self
    }

    pub fn var_step(mut self, chrom: u32, span: u32, items: &[(u32, f32)]) -> Self {
        self.sections.push(Section {
            chrom,
            items: Items::VarStep {
                span,
                items: items.to_vec(),
            },
        });
        self
    }

    pub fn fixed_step(
        mut self,
        chrom: u32,
        start: u32,
        step: u32,
        span: u32,
        values: &[f32],
    ) -> Self {
        self.sections.push(Section {
            chrom,
            items: Items::FixedStep {
                start,
                step,
                span,
                values: values.to_vec(),
            },
        });
        self
    }

    /// Every `(chrom, start, end, value)` in the data sections
    pub fn intervals(&self) -> Vec<(u32, u32, u32, f32)> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.items
                    .intervals()
                    .into_iter()
                    .map(move |(start, end, v)| (s.chrom, start, end, v))
            })
            .collect()
    }

    /// Adds a zoom level summarizing the data sections into buckets of
    /// `reduction_level` bases. Each record spans the data inside its bucket.
    pub fn with_zoom(mut self, reduction_level: u32) -> Self {
        #[derive(Default)]
        struct Acc {
            start: u32,
            end: u32,
            valid: u32,
            min: f64,
            max: f64,
            sum: f64,
            sum_squares: f64,
        }
        let r = u64::from(reduction_level);
        let mut buckets: BTreeMap<(u32, u64), Acc> = BTreeMap::new();
        for (chrom, start, end, v) in self.intervals() {
            if v.is_nan() {
                continue;
            }
            let v = f64::from(v);
            let mut pos = u64::from(start);
            while pos < u64::from(end) {
                let bucket = pos / r;
                let piece_end = ((bucket + 1) * r).min(u64::from(end));
                let w = (piece_end - pos) as f64;
                let acc = buckets.entry((chrom, bucket)).or_insert_with(|| Acc {
                    start: u32::MAX,
                    min: f64::INFINITY,
                    max: f64::NEG_INFINITY,
                    ..Default::default()
                });
                acc.start = acc.start.min(pos as u32);
                acc.end = acc.end.max(piece_end as u32);
                acc.valid += (piece_end - pos) as u32;
                acc.min = acc.min.min(v);
                acc.max = acc.max.max(v);
                acc.sum += w * v;
                acc.sum_squares += w * v * v;
                pos = piece_end;
            }
        }
        let records = buckets
            .into_iter()
            .map(|((chrom, _), acc)| ZoomItem {
                chrom,
                start: acc.start,
                end: acc.end,
                valid_count: acc.valid,
                min: acc.min as f32,
                max: acc.max as f32,
                sum: acc.sum as f32,
                sum_squares: acc.sum_squares as f32,
            })
            .collect();
        self.zooms.push((reduction_level, records));
        self
    }

    fn compress(&self, raw: Vec<u8>) -> Vec<u8> {
        if !self.compressed {
            return raw;
        }
        let mut compressor = Compressor::new(CompressionLvl::default());
        let mut out = vec![0; compressor.zlib_compress_bound(raw.len())];
        let len = compressor.zlib_compress(&raw, &mut out).unwrap();
        out.truncate(len);
        out
    }

    fn encode_section(&self, section: &Section) -> (Vec<u8>, u32, u32) {
        let mut out = Out::new(self.big_endian);
        let intervals = section.items.intervals();
        let start = intervals.iter().map(|i| i.0).min().unwrap_or(0);
        let end = intervals.iter().map(|i| i.1).max().unwrap_or(0);
        let (step, span, section_type) = match &section.items {
            Items::BedGraph(_) => (0, 0, 1),
            Items::VarStep { span, .. } => (0, *span, 2),
            Items::FixedStep { step, span, .. } => (*step, *span, 3),
        };
        out.u32(section.chrom);
        out.u32(start);
        out.u32(end);
        out.u32(step);
        out.u32(span);
        out.u8(section_type);
        out.u8(0);
        out.u16(intervals.len() as u16);
        match &section.items {
            Items::BedGraph(items) => {
                for &(s, e, v) in items {
                    out.u32(s);
                    out.u32(e);
                    out.f32(v);
                }
            }
            Items::VarStep { items, .. } => {
                for &(s, v) in items {
                    out.u32(s);
                    out.f32(v);
                }
            }
            Items::FixedStep { values, .. } => {
                for &v in values {
                    out.f32(v);
                }
            }
        }
        (out.data, start, end)
    }

    fn write_cir_tree(&self, out: &mut Out, items: &[IndexItem]) {
        out.u32(CIR_TREE_MAGIC);
        out.u32(self.items_per_leaf as u32);
        out.u64(items.len() as u64);
        out.u32(items.first().map_or(0, |i| i.start_chrom));
        out.u32(items.first().map_or(0, |i| i.start_base));
        out.u32(items.last().map_or(0, |i| i.end_chrom));
        out.u32(items.last().map_or(0, |i| i.end_base));
        out.u64(0);
        out.u32(1);
        out.u32(0);

        let write_leaf = |out: &mut Out, items: &[IndexItem]| {
            out.u8(1);
            out.u8(0);
            out.u16(items.len() as u16);
            for item in items {
                out.u32(item.start_chrom);
                out.u32(item.start_base);
                out.u32(item.end_chrom);
                out.u32(item.end_base);
                out.u64(item.offset);
                out.u64(item.size);
            }
        };

        if items.len() <= self.items_per_leaf {
            write_leaf(&mut *out, items);
            return;
        }
        let leaves: Vec<&[IndexItem]> = items.chunks(self.items_per_leaf).collect();
        let root_offset = out.pos();
        let mut child_offset = root_offset + 4 + 24 * leaves.len() as u64;
        out.u8(0);
        out.u8(0);
        out.u16(leaves.len() as u16);
        for leaf in &leaves {
            let first = leaf.iter().map(|i| (i.start_chrom, i.start_base)).min().unwrap();
            let last = leaf.iter().map(|i| (i.end_chrom, i.end_base)).max().unwrap();
            out.u32(first.0);
            out.u32(first.1);
            out.u32(last.0);
            out.u32(last.1);
            out.u64(child_offset);
            child_offset += 4 + 32 * leaf.len() as u64;
        }
        for leaf in leaves {
            write_leaf(&mut *out, leaf);
        }
    }

    fn write_chrom_tree(&self, out: &mut Out) {
        let key_size = self.chroms.iter().map(|c| c.0.len()).max().unwrap_or(1).max(1);
        out.u32(CHROM_TREE_MAGIC);
        out.u32(self.chrom_leaf_size as u32);
        out.u32(key_size as u32);
        out.u32(8);
        out.u64(self.chroms.len() as u64);
        out.u64(0);

        let key = |out: &mut Out, name: &str| {
            out.data.extend_from_slice(name.as_bytes());
            out.data.extend(std::iter::repeat(0).take(key_size - name.len()));
        };
        let chroms: Vec<(usize, &(String, u32))> = self.chroms.iter().enumerate().collect();
        let write_leaf = |out: &mut Out, chroms: &[(usize, &(String, u32))]| {
            out.u8(1);
            out.u8(0);
            out.u16(chroms.len() as u16);
            for (id, (name, length)) in chroms {
                key(&mut *out, name.as_str());
                out.u32(*id as u32);
                out.u32(*length);
            }
        };

        if chroms.len() <= self.chrom_leaf_size {
            write_leaf(&mut *out, &chroms[..]);
            return;
        }
        let leaves: Vec<_> = chroms.chunks(self.chrom_leaf_size).collect();
        let item_size = key_size as u64 + 8;
        let mut child_offset = out.pos() + 4 + item_size * leaves.len() as u64;
        out.u8(0);
        out.u8(0);
        out.u16(leaves.len() as u16);
        for leaf in &leaves {
            key(&mut *out, (leaf[0].1).0.as_str());
            out.u64(child_offset);
            child_offset += 4 + item_size * leaf.len() as u64;
        }
        for leaf in leaves {
            write_leaf(&mut *out, leaf);
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Out::new(self.big_endian);
        out.data.resize(64 + 24 * self.zooms.len(), 0);

        let total_summary_offset = if self.total_summary {
            let offset = out.pos();
            let mut covered = 0u64;
            let (mut min, mut max, mut sum, mut sum_squares) =
                (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0.0);
            for (_, s, e, v) in self.intervals() {
                if v.is_nan() {
                    continue;
                }
                let v = f64::from(v);
                let w = f64::from(e - s);
                covered += u64::from(e - s);
                min = min.min(v);
                max = max.max(v);
                sum += w * v;
                sum_squares += w * v * v;
            }
            out.u64(covered);
            out.f64(min);
            out.f64(max);
            out.f64(sum);
            out.f64(sum_squares);
            offset
        } else {
            0
        };

        let chrom_tree_offset = out.pos();
        self.write_chrom_tree(&mut out);

        let mut uncompress_buf_size = 0;
        let full_data_offset = out.pos();
        out.u64(self.sections.len() as u64);
        let mut index_items = vec![];
        for section in &self.sections {
            let (raw, start, end) = self.encode_section(section);
            uncompress_buf_size = uncompress_buf_size.max(raw.len());
            let data = self.compress(raw);
            index_items.push(IndexItem {
                start_chrom: section.chrom,
                start_base: start,
                end_chrom: section.chrom,
                end_base: end,
                offset: out.pos(),
                size: data.len() as u64,
            });
            out.data.extend_from_slice(&data);
        }
        let full_index_offset = out.pos();
        self.write_cir_tree(&mut out, &index_items);

        let mut zoom_headers = vec![];
        for (reduction_level, records) in &self.zooms {
            let data_offset = out.pos();
            out.u32(records.len() as u32);
            let mut index_items = vec![];
            let mut by_chrom: BTreeMap<u32, Vec<ZoomItem>> = BTreeMap::new();
            for r in records {
                by_chrom.entry(r.chrom).or_default().push(*r);
            }
            for (chrom, records) in by_chrom {
                for block in records.chunks(self.zoom_items_per_block) {
                    let mut raw = Out::new(self.big_endian);
                    for r in block {
                        raw.u32(r.chrom);
                        raw.u32(r.start);
                        raw.u32(r.end);
                        raw.u32(r.valid_count);
                        raw.f32(r.min);
                        raw.f32(r.max);
                        raw.f32(r.sum);
                        raw.f32(r.sum_squares);
                    }
                    uncompress_buf_size = uncompress_buf_size.max(raw.data.len());
                    let data = self.compress(raw.data);
                    index_items.push(IndexItem {
                        start_chrom: chrom,
                        start_base: block.iter().map(|r| r.start).min().unwrap(),
                        end_chrom: chrom,
                        end_base: block.iter().map(|r| r.end).max().unwrap(),
                        offset: out.pos(),
                        size: data.len() as u64,
                    });
                    out.data.extend_from_slice(&data);
                }
            }
            let index_offset = out.pos();
            self.write_cir_tree(&mut out, &index_items);
            zoom_headers.push((*reduction_level, data_offset, index_offset));
        }

        let mut header = Out::new(self.big_endian);
        header.u32(self.magic);
        header.u16(self.version);
        header.u16(self.zooms.len() as u16);
        header.u64(chrom_tree_offset);
        header.u64(full_data_offset);
        header.u64(full_index_offset);
        header.u16(0);
        header.u16(0);
        header.u64(0);
        header.u64(total_summary_offset);
        header.u32(if self.compressed {
            uncompress_buf_size.max(1) as u32
        } else {
            0
        });
        header.u64(0);
        for (reduction_level, data_offset, index_offset) in zoom_headers {
            header.u32(reduction_level);
            header.u32(0);
            header.u64(data_offset);
            header.u64(index_offset);
        }
        out.data[..header.data.len()].copy_from_slice(&header.data);
        out.data
    }
}

/// Overwrites a header field, in the file's byte order
pub fn patch_u64(data: &mut [u8], at: usize, v: u64, big_endian: bool) {
    let b = if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    data[at..at + 8].copy_from_slice(&b);
}

pub fn patch_u16(data: &mut [u8], at: usize, v: u16, big_endian: bool) {
    let b = if big_endian { v.to_be_bytes() } else { v.to_le_bytes() };
    data[at..at + 2].copy_from_slice(&b);
}

/// `chr1` with `[0, 100) = 1` and `[100, 200) = 2`
pub fn two_steps() -> BigWigBuilder {
    BigWigBuilder::new(&[("chr1", 1000)]).bedgraph(0, &[(0, 100, 1.0), (100, 200, 2.0)])
}
