use byteorder::{BigEndian, WriteBytesExt};
use unityfs::{ArchiveError, ArchiveFlags, Bundle, BundleHeader, ALIGNED_HEADER_SIZE, HEADER_SIZE};

const NONE: u32 = 0;
const LZ4: u32 = 2;

struct BundleBuilder {
    format_version: u32,
    engine_revision: &'static str,
    raw_flags: u32,
    info_compression: u32,
    block_compression: u32,
    block_size: usize,
    nodes: Vec<(&'static str, Vec<u8>)>,
    align_table: bool,
    /// Written into the 50..64 gap when the table is aligned.
    gap_fill: u8,
}

impl BundleBuilder {
    fn new(nodes: Vec<(&'static str, Vec<u8>)>) -> Self {
        Self {
            format_version: 7,
            engine_revision: "2019.4.40f1",
            raw_flags: 0x40,
            info_compression: LZ4,
            block_compression: LZ4,
            block_size: 1024,
            nodes,
            align_table: true,
            gap_fill: 0xA5,
        }
    }

    fn compress(kind: u32, data: &[u8]) -> Vec<u8> {
        match kind {
            LZ4 => lz4_flex::block::compress(data),
            _ => data.to_vec(),
        }
    }

    fn build(&self) -> Vec<u8> {
        let stream: Vec<u8> = self.nodes.iter().flat_map(|(_, data)| data.clone()).collect();
        let blocks: Vec<(usize, Vec<u8>)> = stream
            .chunks(self.block_size)
            .map(|chunk| (chunk.len(), Self::compress(self.block_compression, chunk)))
            .collect();

        let mut info = vec![0u8; 16];
        info.write_i32::<BigEndian>(blocks.len() as i32).unwrap();
        for (size, data) in &blocks {
            info.write_u32::<BigEndian>(*size as u32).unwrap();
            info.write_u32::<BigEndian>(data.len() as u32).unwrap();
            info.write_u16::<BigEndian>(self.block_compression as u16).unwrap();
        }
        info.write_i32::<BigEndian>(self.nodes.len() as i32).unwrap();
        let mut offset = 0u64;
        for (path, data) in &self.nodes {
            info.write_i64::<BigEndian>(offset as i64).unwrap();
            info.write_i64::<BigEndian>(data.len() as i64).unwrap();
            info.write_u32::<BigEndian>(4).unwrap();
            info.extend_from_slice(path.as_bytes());
            info.push(0);
            offset += data.len() as u64;
        }
        let compressed_info = Self::compress(self.info_compression, &info);

        let mut out = Vec::new();
        out.extend_from_slice(b"UnityFS\0");
        out.write_u32::<BigEndian>(self.format_version).unwrap();
        out.extend_from_slice(b"5.x.x\0");
        let mut revision = self.engine_revision.as_bytes().to_vec();
        revision.resize(12, 0);
        out.extend_from_slice(&revision);
        out.write_i64::<BigEndian>(0).unwrap(); // patched below
        out.write_u32::<BigEndian>(compressed_info.len() as u32).unwrap();
        out.write_u32::<BigEndian>(info.len() as u32).unwrap();
        out.write_u32::<BigEndian>(self.raw_flags | self.info_compression).unwrap();
        assert_eq!(out.len() as u64, HEADER_SIZE);

        if self.align_table {
            out.resize(ALIGNED_HEADER_SIZE as usize, self.gap_fill);
        }
        out.extend_from_slice(&compressed_info);
        if self.raw_flags & 0x200 != 0 {
            out.resize((out.len() + 15) & !15, 0);
        }
        for (_, data) in &blocks {
            out.extend_from_slice(data);
        }

        let total = out.len() as i64;
        out[30..38].copy_from_slice(&total.to_be_bytes());
        out
    }
}

fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn multi_block_nodes_round_trip() -> Result<(), anyhow::Error> {
    let main = payload(3000, 1);
    let blob = payload(700, 2);
    let builder = BundleBuilder::new(vec![("CAB-0123", main.clone()), ("CAB-0123.resS", blob.clone())]);
    let buf = builder.build();

    let bundle = Bundle::parse(&buf)?;
    assert_eq!(bundle.header.format_version, 7);
    assert_eq!(bundle.header.engine_revision, "2019.4.40f1");
    assert_eq!(bundle.header.blocks_info_offset, ALIGNED_HEADER_SIZE);
    assert_eq!(bundle.blocks.len(), 4);
    assert_eq!(bundle.data_size(), 3700);

    let main_node = bundle.node("CAB-0123").expect("main node");
    assert_eq!(bundle.read_node(&buf, main_node)?, main);
    let blob_node = bundle.node("CAB-0123.resS").expect("blob node");
    assert_eq!(bundle.read_node(&buf, blob_node)?, blob);

    // the streamed payload is not a container
    let containers: Vec<_> = bundle.containers().map(|node| node.path.as_str()).collect();
    assert_eq!(containers, vec!["CAB-0123"]);
    Ok(())
}

#[test]
fn partial_range_touches_only_overlapping_blocks() -> Result<(), anyhow::Error> {
    let main = payload(4096, 7);
    let buf = BundleBuilder::new(vec![("CAB-aa", main.clone())]).build();
    let bundle = Bundle::parse(&buf)?;

    assert_eq!(bundle.blocks_for_range(1000, 100), 0..2);
    assert_eq!(bundle.blocks_for_range(1024, 1024), 1..2);
    assert_eq!(bundle.blocks_for_range(4000, 0), 3..3);

    let range = bundle.read_range(&buf, 1000, 100)?;
    assert_eq!(range, main[1000..1100].to_vec());
    Ok(())
}

#[test]
fn uncompressed_v6_bundle() -> Result<(), anyhow::Error> {
    let main = payload(100, 3);
    let mut builder = BundleBuilder::new(vec![("CAB-v6", main.clone())]);
    builder.format_version = 6;
    builder.align_table = false;
    builder.info_compression = NONE;
    builder.block_compression = NONE;
    let buf = builder.build();

    let bundle = Bundle::parse(&buf)?;
    assert_eq!(bundle.header.blocks_info_offset, HEADER_SIZE);
    assert_eq!(bundle.read_node(&buf, &bundle.nodes[0])?, main);
    Ok(())
}

#[test]
fn uncompressed_table_at_50_in_v7() -> Result<(), anyhow::Error> {
    let main = payload(512, 9);
    let mut builder = BundleBuilder::new(vec![("CAB-unaligned", main.clone())]);
    builder.align_table = false;
    builder.info_compression = NONE;
    let buf = builder.build();
    // the zeroed hash of the table fills the gap
    assert!(buf[HEADER_SIZE as usize..ALIGNED_HEADER_SIZE as usize].iter().all(|b| *b == 0));

    let bundle = Bundle::parse(&buf)?;
    assert_eq!(bundle.header.blocks_info_offset, HEADER_SIZE);
    assert_eq!(bundle.nodes.len(), 1);
    assert_eq!(bundle.read_node(&buf, &bundle.nodes[0])?, main);
    Ok(())
}

#[test]
fn older_engines_read_the_table_after_the_header() -> Result<(), anyhow::Error> {
    let main = payload(600, 4);
    let mut builder = BundleBuilder::new(vec![("CAB-2018", main.clone())]);
    builder.engine_revision = "2018.4.36f1";
    builder.align_table = false;
    let buf = builder.build();

    let bundle = Bundle::parse(&buf)?;
    assert_eq!(bundle.header.blocks_info_offset, HEADER_SIZE);
    assert_eq!(bundle.read_node(&buf, &bundle.nodes[0])?, main);
    Ok(())
}

#[test]
fn zeroed_gap_selects_the_earlier_offset() -> Result<(), anyhow::Error> {
    let mut builder = BundleBuilder::new(vec![("CAB-zero", payload(64, 1))]);
    builder.gap_fill = 0;
    let buf = builder.build();

    let header = BundleHeader::parse(&buf)?;
    assert_eq!(header.blocks_info_offset, HEADER_SIZE);
    Ok(())
}

#[test]
fn padded_data_after_block_table() -> Result<(), anyhow::Error> {
    let main = payload(2048, 5);
    let mut builder = BundleBuilder::new(vec![("CAB-padded", main.clone())]);
    builder.raw_flags |= 0x200;
    let buf = builder.build();

    let bundle = Bundle::parse(&buf)?;
    assert!(bundle
        .header
        .flags
        .contains(ArchiveFlags::BLOCK_INFO_NEED_PADDING_AT_START));
    assert_eq!(bundle.header.data_offset % 16, 0);
    assert_eq!(bundle.read_node(&buf, &bundle.nodes[0])?, main);
    Ok(())
}

#[test]
fn encrypted_archives_are_rejected() {
    let mut builder = BundleBuilder::new(vec![("CAB-enc", payload(16, 0))]);
    builder.engine_revision = "2019.3.0f6";
    builder.raw_flags |= 0x200;
    let buf = builder.build();

    assert!(matches!(BundleHeader::parse(&buf), Err(ArchiveError::Encrypted)));
}

#[test]
fn unknown_versions_and_signatures_are_fatal() {
    let mut builder = BundleBuilder::new(vec![("CAB-v8", payload(16, 0))]);
    builder.format_version = 8;
    let buf = builder.build();
    assert!(matches!(BundleHeader::parse(&buf), Err(ArchiveError::UnsupportedVersion(8))));

    let mut buf = BundleBuilder::new(vec![("CAB", payload(16, 0))]).build();
    buf[0] = b'X';
    assert!(matches!(BundleHeader::parse(&buf), Err(ArchiveError::InvalidSignature(_))));
}
