//! Integration tests for resolve → encode → resolve → decode pipelines
//!
//! Each test writes a file through the encoder the registry selects for the
//! destination, then reads it back through the decoder selected by
//! signature.

use biometal_codecs::format::content_types::{ALIGNED_READS, HAPLOID_REFERENCE, VARIANT_CONTEXTS};
use biometal_codecs::{
    Bundle, CodecError, CodecOptions, DecoderOptions, EncoderOptions, FastaRecord, HtsHeader,
    HtsRecord, Registry, Version,
};
use std::fs;
use tempfile::TempDir;

fn line(text: &str) -> HtsRecord {
    HtsRecord::Line(text.to_string())
}

#[test]
fn test_bam_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.bam");
    let registry = Registry::with_builtin_codecs().unwrap();

    let alignment = HtsRecord::Alignment(vec![0, 0, 0, 0, 9, 0, 0, 0, 42]);
    {
        let mut encoder = registry
            .reads()
            .encoder_for(
                Bundle::from_path(&path, ALIGNED_READS),
                Version::NEWEST,
                &EncoderOptions::default(),
            )
            .unwrap();
        assert_eq!(encoder.version(), Version::new(1, 0, 0));

        let header = HtsHeader::new(
            "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:500\n".to_string(),
            Vec::new(),
        );
        encoder.write_header(&header).unwrap();
        encoder.write_record(&alignment).unwrap();
        encoder.finish().unwrap();
    }

    let options = DecoderOptions {
        validate_eof_marker: true,
        ..DecoderOptions::default()
    };
    let mut decoder = registry
        .reads()
        .decoder_for(Bundle::from_path(&path, ALIGNED_READS), &options)
        .unwrap();

    let names: Vec<_> = decoder.header().references.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["chr1", "chr2"]);
    assert_eq!(decoder.header().references[1].length, 500);

    let records: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(records, vec![alignment]);
}

#[test]
fn test_sam_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.sam");
    let registry = Registry::with_builtin_codecs().unwrap();

    {
        let mut encoder = registry
            .reads()
            .encoder_for(
                Bundle::from_path(&path, ALIGNED_READS),
                Version::NEWEST,
                &EncoderOptions::default(),
            )
            .unwrap();
        encoder
            .write_header(&HtsHeader::new(
                "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000".to_string(),
                Vec::new(),
            ))
            .unwrap();
        encoder.write_record(&line("r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII")).unwrap();
        assert!(matches!(
            encoder.write_record(&HtsRecord::Alignment(vec![1])),
            Err(CodecError::InvalidInput { .. })
        ));
        encoder.finish().unwrap();
    }

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\nr1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\n"
    );

    let mut decoder = registry
        .reads()
        .decoder_for(Bundle::from_path(&path, ALIGNED_READS), &DecoderOptions::default())
        .unwrap();
    assert_eq!(decoder.header().reference_count(), 1);
    assert_eq!(decoder.records().count(), 1);
}

#[test]
fn test_vcf_bgzf_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("calls.vcf.gz");
    let registry = Registry::with_builtin_codecs().unwrap();

    {
        let mut encoder = registry
            .variants()
            .encoder_for(
                Bundle::from_path(&path, VARIANT_CONTEXTS),
                Version::new(4, 2, 0),
                &EncoderOptions::default(),
            )
            .unwrap();
        let header = HtsHeader::new(
            concat!(
                "##source=test\n",
                "##contig=<ID=chr1,length=1000>\n",
                "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n",
            )
            .to_string(),
            Vec::new(),
        );
        encoder.write_header(&header).unwrap();
        encoder.write_record(&line("chr1\t100\trs1\tA\tT\t30\tPASS\tDP=10")).unwrap();
        encoder.write_record(&line("chr1\t200\t.\tG\tC\t.\t.\t.")).unwrap();
        encoder.finish().unwrap();
    }

    // Compressed on disk
    assert_eq!(&fs::read(&path).unwrap()[..2], &[0x1f, 0x8b]);

    let mut decoder = registry
        .variants()
        .decoder_for(Bundle::from_path(&path, VARIANT_CONTEXTS), &DecoderOptions::default())
        .unwrap();
    assert_eq!(decoder.version(), Version::new(4, 2, 0));
    assert!(decoder.header().text.starts_with("##fileformat=VCFv4.2\n##source=test\n"));
    assert_eq!(decoder.header().references[0].name, "chr1");

    let records: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0], line("chr1\t100\trs1\tA\tT\t30\tPASS\tDP=10"));
}

#[test]
fn test_fasta_roundtrip_with_options_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("codecs.toml");
    fs::write(&config, "[encoder]\nfasta_line_width = 3\ncompression_level = 1\n").unwrap();
    let options = CodecOptions::from_path(&config).unwrap();
    assert_eq!(options.encoder.fasta_line_width, 3);

    let path = dir.path().join("ref.fa.gz");
    let registry = Registry::with_builtin_codecs().unwrap();
    let records = vec![
        HtsRecord::Sequence(FastaRecord::new("chr1".to_string(), b"ACGTACG".to_vec())),
        HtsRecord::Sequence(FastaRecord::new("chrM".to_string(), b"TT".to_vec())),
    ];

    {
        let mut encoder = registry
            .haploid_reference()
            .encoder_for(
                Bundle::from_path(&path, HAPLOID_REFERENCE),
                Version::NEWEST,
                &options.encoder,
            )
            .unwrap();
        encoder.write_header(&HtsHeader::default()).unwrap();
        for record in &records {
            encoder.write_record(record).unwrap();
        }
        encoder.finish().unwrap();
    }

    let mut decoder = registry
        .haploid_reference()
        .decoder_for(Bundle::from_path(&path, HAPLOID_REFERENCE), &options.decoder)
        .unwrap();
    assert!(decoder.header().text.is_empty());
    let decoded: Vec<_> = decoder.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(decoded, records);
}

#[test]
fn test_cram_encoding_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out.cram");
    let registry = Registry::with_builtin_codecs().unwrap();

    let result = registry.reads().encoder_for(
        Bundle::from_path(&path, ALIGNED_READS),
        Version::NEWEST,
        &EncoderOptions::default(),
    );
    match result {
        Err(CodecError::Unsupported { codec, .. }) => assert_eq!(codec, "CRAM 3.1"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("CRAM encoder should not be available"),
    }
    assert!(!path.exists());
}
