/// Integration tests: whole chains through compress, decompress and validate.
///
/// Covers the lossless round trip of every lossless chain, the absolute
/// tolerance guarantee for doubles and for floats near their spacing, chain
/// ordering errors, the precision boundary of abstol, fill values under
/// sigbits and quantize, and the chooser keeping its first decision.
use proptest::prelude::*;
use scil::{
    compress, compress_buffer_size_bound, compress_into, decompress, describe_stream, validate,
    Chain, CompressionContext, Datatype, Dims, ErrorCode, ScilError, UserHints,
};
use scil_core::datatype::{decode_samples, encode_samples, Sample};
use test_case::test_case;

/// Generate `len` deterministic doubles in `[-100, 100)` using a simple LCG.
fn pseudo_random_doubles(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 11) as f64 / (1u64 << 53) as f64 * 200.0 - 100.0
        })
        .collect()
}

/// A smooth field, the kind of data the lossy chains are built for.
fn smooth_field(nx: usize, ny: usize) -> Vec<f64> {
    (0..nx * ny)
        .map(|i| {
            let (x, y) = ((i % nx) as f64, (i / nx) as f64);
            20.0 + (x / 7.0).sin() * 5.0 + (y / 3.0).cos() * 2.5
        })
        .collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn bytes<T: Sample>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_samples(values, &mut out);
    out
}

fn context(datatype: Datatype, chain: &str, hints: UserHints) -> CompressionContext {
    let hints = UserHints { force_compression_methods: Some(chain.to_string()), ..hints };
    CompressionContext::new(datatype, &hints).unwrap()
}

fn abs_tol(t: f64) -> UserHints {
    UserHints { absolute_tolerance: t, ..UserHints::default() }
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test_case("memcopy" ; "memcopy")]
#[test_case("lz4" ; "lz4")]
#[test_case("zstd" ; "zstd")]
#[test_case("gzip" ; "gzip")]
#[test_case("xor_delta" ; "xor delta alone")]
#[test_case("xor_delta,lz4" ; "xor delta then lz4")]
#[test_case("xor_delta,xor_delta,zstd" ; "two preconditioners")]
fn test_roundtrip_lossless_double(chain: &str) {
    let values = pseudo_random_doubles(4096, 7);
    let src = bytes(&values);
    let dims = Dims::new_2d(64, 64);

    let mut ctx = context(Datatype::Double, chain, UserHints::default());
    assert!(!ctx.chain().unwrap().is_lossy());
    let out = compress(&mut ctx, &src, &dims).unwrap();
    let back = decompress(Datatype::Double, &dims, &out).unwrap();
    assert_eq!(back, src, "{chain} round-trip should be byte-exact");
}

#[test_case(Datatype::Int8, "delta,lz4" ; "int8 delta")]
#[test_case(Datatype::Int16, "xor_delta,delta,gzip" ; "int16 both preconditioners")]
#[test_case(Datatype::Int32, "delta,zstd" ; "int32 delta")]
#[test_case(Datatype::Int64, "xor_delta,memcopy" ; "int64 xor")]
fn test_roundtrip_lossless_integers(datatype: Datatype, chain: &str) {
    let dims = Dims::new_3d(10, 10, 10);
    let src: Vec<u8> = (0..dims.size_in_bytes(datatype)).map(|i| (i * 31 % 251) as u8).collect();
    let mut ctx = context(datatype, chain, UserHints::default());
    let out = compress(&mut ctx, &src, &dims).unwrap();
    assert_eq!(decompress(datatype, &dims, &out).unwrap(), src);
}

#[test]
fn test_abstol_zero_to_nine() {
    let values: Vec<f64> = (0..10).map(f64::from).collect();
    let src = bytes(&values);
    let dims = Dims::new_1d(10);
    let mut ctx = context(Datatype::Double, "abstol", abs_tol(1.0));

    let out = compress(&mut ctx, &src, &dims).unwrap();
    assert!(out.len() < src.len());
    let report = validate(&ctx, &src, &dims, &out).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert!(report.accuracy.absolute_tolerance <= 1.0);
}

#[test]
fn test_lossy_chains_on_a_smooth_field() {
    let values = smooth_field(120, 40);
    let src = bytes(&values);
    let dims = Dims::new_2d(120, 40);

    for chain in ["abstol,lz4", "abstol,zstd", "quantize,delta,zstd", "quantize,delta,gzip"] {
        let mut ctx = context(Datatype::Double, chain, abs_tol(0.01));
        let out = compress(&mut ctx, &src, &dims).unwrap();
        assert!(out.len() * 4 < src.len(), "{chain} compressed to {} bytes", out.len());
        let report = validate(&ctx, &src, &dims, &out).unwrap();
        assert!(report.passed(), "{chain}: {:?}", report.failures);
    }
}

#[test]
fn test_sigbits_meets_significant_digits() {
    let values: Vec<f32> = smooth_field(50, 20).into_iter().map(|v| v as f32).collect();
    let src = bytes(&values);
    let dims = Dims::new_2d(50, 20);
    let hints = UserHints { significant_digits: 3, ..UserHints::default() };
    let mut ctx = context(Datatype::Float, "sigbits,lz4", hints);
    assert_eq!(ctx.effective_hints().significant_bits, 10);

    let out = compress(&mut ctx, &src, &dims).unwrap();
    let report = validate(&ctx, &src, &dims, &out).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
    assert!(report.accuracy.significant_bits >= 10);
}

#[test]
fn test_sigbits_keeps_fill_values() {
    const FILL: f64 = -9999.0;
    let values: Vec<f64> = (0..300)
        .map(|i| if i % 17 == 3 { FILL } else { 1.0 + i as f64 * 0.37 })
        .collect();
    let src = bytes(&values);
    let dims = Dims::new_1d(values.len());
    let hints = UserHints { significant_bits: 4, fill_value: FILL, ..UserHints::default() };
    let mut ctx = context(Datatype::Double, "sigbits", hints);

    let out = compress(&mut ctx, &src, &dims).unwrap();
    let back: Vec<f64> = decode_samples(&decompress(Datatype::Double, &dims, &out).unwrap()).unwrap();
    for (a, b) in values.iter().zip(&back) {
        if *a == FILL {
            assert_eq!(a.to_bits(), b.to_bits());
        } else {
            assert!((a - b).abs() <= a.abs() / 16.0, "{a} became {b}");
        }
    }
}

#[test]
fn test_quantize_keeps_fill_values() {
    const FILL: f32 = 9999.123;
    let values: Vec<f32> = (0..50).map(|i| if i % 9 == 4 { FILL } else { i as f32 }).collect();
    let src = bytes(&values);
    let dims = Dims::new_1d(values.len());
    let hints = UserHints { fill_value: f64::from(FILL), ..abs_tol(0.01) };
    let mut ctx = context(Datatype::Float, "quantize,delta,zstd", hints);

    let out = compress(&mut ctx, &src, &dims).unwrap();
    let back: Vec<f32> = decode_samples(&decompress(Datatype::Float, &dims, &out).unwrap()).unwrap();
    for (a, b) in values.iter().zip(&back) {
        if *a == FILL {
            assert_eq!(a.to_bits(), b.to_bits(), "fill became {b}");
        } else {
            assert!((a - b).abs() <= 0.01, "{a} became {b}");
        }
    }
    let report = validate(&ctx, &src, &dims, &out).unwrap();
    assert!(report.passed(), "failures: {:?}", report.failures);
}

#[test]
fn test_chain_ordering_rejection() {
    let err = Chain::parse("gzip,abstol").unwrap_err();
    assert!(matches!(err, ScilError::InvalidChain(_)));
    assert_eq!(err.code(), ErrorCode::Einval);
    assert!(Chain::parse("abstol,gzip").is_ok());

    let hints = UserHints { force_compression_methods: Some("gzip,abstol".into()), ..abs_tol(1.0) };
    let err = CompressionContext::new(Datatype::Double, &hints).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Einval);
}

#[test]
fn test_precision_error_boundary() {
    let src = bytes(&[-1e10f64, 0.0, 3.5, 1e10]);
    let dims = Dims::new_1d(4);
    let mut ctx = context(Datatype::Double, "abstol", abs_tol(1e-300));
    let err = compress(&mut ctx, &src, &dims).unwrap_err();
    assert_eq!(err.code(), ErrorCode::PrecisionErr);
}

#[test]
fn test_choose_keeps_first_decision() {
    let mut ctx = CompressionContext::new(Datatype::Double, &UserHints::default()).unwrap();
    assert!(ctx.chain().is_none());
    let dims = Dims::new_1d(4096);

    compress(&mut ctx, &bytes(&vec![1.0f64; 4096]), &dims).unwrap();
    let first = ctx.chain().cloned().unwrap();

    let out = compress(&mut ctx, &bytes(&pseudo_random_doubles(4096, 99)), &dims).unwrap();
    assert_eq!(ctx.chain(), Some(&first));
    assert_eq!(describe_stream(&out).unwrap().chain, Some(first));
}

#[test]
fn test_memory_bound() {
    let src = bytes(&[2.0f32; 64]);
    let dims = Dims::new_1d(64);
    let mut ctx = context(Datatype::Float, "zstd", UserHints::default());

    let mut dest = vec![0u8; compress_buffer_size_bound(Datatype::Float, &dims) - 1];
    let err = compress_into(&mut ctx, &src, &dims, &mut dest).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MemoryErr);

    dest.push(0);
    let n = compress_into(&mut ctx, &src, &dims, &mut dest).unwrap();
    assert_eq!(decompress(Datatype::Float, &dims, &dest[..n]).unwrap(), src);
}

proptest! {
    #[test]
    fn prop_abstol_bounds_the_error(
        values in prop::collection::vec(-1.0e4f64..1.0e4, 1..400),
        tol in 1.0e-3f64..10.0,
    ) {
        let src = bytes(&values);
        let dims = Dims::new_1d(values.len());
        let mut ctx = context(Datatype::Double, "abstol,lz4", abs_tol(tol));
        let out = compress(&mut ctx, &src, &dims).unwrap();
        let back: Vec<f64> = decode_samples(&decompress(Datatype::Double, &dims, &out).unwrap()).unwrap();
        for (a, b) in values.iter().zip(&back) {
            prop_assert!((a - b).abs() <= tol, "{} became {} with tol {}", a, b, tol);
        }
    }

    #[test]
    fn prop_float_tolerance_near_the_spacing(
        values in prop::collection::vec(1.0f32..2.0, 1..300),
        factor in 0.25f64..4.0,
        chain in prop::sample::select(vec!["abstol", "abstol,lz4", "quantize,delta,zstd"]),
    ) {
        // one float spacing in [1, 2) is f32::EPSILON
        let tol = f64::from(f32::EPSILON) * factor;
        let src = bytes(&values);
        let dims = Dims::new_1d(values.len());
        let mut ctx = context(Datatype::Float, chain, abs_tol(tol));
        let out = compress(&mut ctx, &src, &dims).unwrap();
        let back: Vec<f32> = decode_samples(&decompress(Datatype::Float, &dims, &out).unwrap()).unwrap();
        for (a, b) in values.iter().zip(&back) {
            let err = (f64::from(*a) - f64::from(*b)).abs();
            prop_assert!(err <= tol, "{} became {} with tol {} under {}", a, b, tol, chain);
        }
    }

    #[test]
    fn prop_lossless_chain_is_bit_exact(values in prop::collection::vec(any::<i32>(), 0..300)) {
        let src = bytes(&values);
        let dims = Dims::new_1d(values.len());
        let mut ctx = context(Datatype::Int32, "xor_delta,delta,zstd", UserHints::default());
        let out = compress(&mut ctx, &src, &dims).unwrap();
        prop_assert_eq!(decompress(Datatype::Int32, &dims, &out).unwrap(), src);
    }
}
