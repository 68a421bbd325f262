//! GPU integration tests for the bake pipeline.
//!
//! Each test acquires a headless adapter and skips (with a message) when
//! the machine has none, so the suite can run on CI boxes without a GPU.

use ibl_pipeline::{
    EnvironmentSource, IblConfig, IblPipeline, RenderContext, ScratchRenderTarget,
};

fn test_context() -> Option<RenderContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    match RenderContext::new_headless() {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("no GPU adapter available, skipping: {e}");
            None
        }
    }
}

/// Decode tightly packed Rgba16Float rows into f32 values.
fn decode_f16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
        .collect()
}

/// RGBA f32 pixels of a solid-color equirectangular image.
fn solid_pixels(width: u32, height: u32, rgb: [f32; 3]) -> Vec<f32> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        pixels.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 1.0]);
    }
    pixels
}

fn assert_channels_near(values: &[f32], expected: [f32; 3], tolerance: f32, what: &str) {
    for texel in values.chunks_exact(4) {
        for c in 0..3 {
            assert!(
                (texel[c] - expected[c]).abs() < tolerance,
                "{what}: channel {c} was {} (expected {} +/- {tolerance})",
                texel[c],
                expected[c]
            );
        }
    }
}

#[test]
fn scratch_resize_recreates_only_on_change() {
    let Some(ctx) = test_context() else { return };

    let mut scratch =
        ScratchRenderTarget::new(&ctx, 128, 128, wgpu::TextureFormat::Rgba16Float).unwrap();
    assert_eq!(scratch.recreations(), 0);

    // Same extent and format: nothing happens.
    scratch.resize(&ctx, 128, 128).unwrap();
    scratch
        .set_format(&ctx, wgpu::TextureFormat::Rgba16Float)
        .unwrap();
    assert_eq!(scratch.recreations(), 0);

    scratch.resize(&ctx, 64, 64).unwrap();
    assert_eq!(scratch.recreations(), 1);
    assert_eq!(scratch.width(), 64);

    scratch
        .set_format(&ctx, wgpu::TextureFormat::Rgba8Unorm)
        .unwrap();
    assert_eq!(scratch.recreations(), 2);

    assert!(scratch.resize(&ctx, 0, 64).is_err());
}

#[test]
fn solid_color_panorama_projects_to_solid_faces() {
    let Some(ctx) = test_context() else { return };

    let color = [0.25f32, 0.5, 0.75];
    let source = EnvironmentSource::from_pixels(&ctx, 4, 2, &solid_pixels(4, 2, color)).unwrap();

    let config = IblConfig {
        base_size: 16,
        irradiance_size: 8,
        specular_base_size: 8,
        specular_mip_count: 2,
        brdf_lut_size: 16,
        ..IblConfig::default()
    };
    let mut pipeline = IblPipeline::new(&ctx, config).unwrap();
    let output = pipeline.bake(&ctx, &source).unwrap();

    for face in 0..6 {
        let bytes = ctx
            .read_texture_layer(&output.environment.texture, 0, face)
            .unwrap();
        let values = decode_f16(&bytes);
        assert_eq!(values.len(), 16 * 16 * 4);
        assert_channels_near(&values, color, 0.01, &format!("environment face {face}"));
    }
}

#[test]
fn uniform_environment_bakes_uniform_lighting() {
    let Some(ctx) = test_context() else { return };

    let gray = [0.5f32, 0.5, 0.5];
    let source = EnvironmentSource::from_pixels(&ctx, 4, 2, &solid_pixels(4, 2, gray)).unwrap();

    let config = IblConfig {
        base_size: 32,
        irradiance_size: 8,
        specular_base_size: 16,
        specular_mip_count: 3,
        brdf_lut_size: 16,
        ..IblConfig::default()
    };
    let mut pipeline = IblPipeline::new(&ctx, config).unwrap();
    let output = pipeline.bake(&ctx, &source).unwrap();

    // A uniform radiance field convolves to itself.
    for face in 0..6 {
        let bytes = ctx
            .read_texture_layer(&output.irradiance.texture, 0, face)
            .unwrap();
        assert_channels_near(
            &decode_f16(&bytes),
            gray,
            0.05,
            &format!("irradiance face {face}"),
        );
    }

    // Prefiltering a constant environment is constant at every roughness.
    for mip in 0..output.specular.mip_count {
        for face in 0..6 {
            let bytes = ctx
                .read_texture_layer(&output.specular.texture, mip, face)
                .unwrap();
            let values = decode_f16(&bytes);
            let expected_len = ((16u32 >> mip).max(1).pow(2) * 4) as usize;
            assert_eq!(values.len(), expected_len);
            assert_channels_near(
                &values,
                gray,
                0.02,
                &format!("specular mip {mip} face {face}"),
            );
        }
    }
}

#[test]
fn brdf_lut_boundary_values() {
    let Some(ctx) = test_context() else { return };

    let source = EnvironmentSource::from_pixels(&ctx, 4, 2, &solid_pixels(4, 2, [1.0; 3])).unwrap();
    let size = 64u32;
    let config = IblConfig {
        base_size: 16,
        irradiance_size: 8,
        specular_base_size: 8,
        specular_mip_count: 2,
        brdf_lut_size: size,
        ..IblConfig::default()
    };
    let mut pipeline = IblPipeline::new(&ctx, config).unwrap();
    let output = pipeline.bake(&ctx, &source).unwrap();

    let bytes = ctx.read_texture_layer(&output.brdf_lut.texture, 0, 0).unwrap();
    let values = decode_f16(&bytes);
    assert_eq!(values.len(), (size * size * 4) as usize);

    // Top-right texel: N.V -> 1, roughness -> 0. The scale term approaches
    // 1 and the bias term approaches 0.
    let idx = ((size - 1) * 4) as usize;
    let scale = values[idx];
    let bias = values[idx + 1];
    assert!(
        (scale - 1.0).abs() < 0.05,
        "scale at grazing-free corner was {scale}"
    );
    assert!(bias.abs() < 0.05, "bias at grazing-free corner was {bias}");

    // Every entry stays inside [0, 1] up to f16 rounding.
    for texel in values.chunks_exact(4) {
        assert!((0.0..=1.01).contains(&texel[0]));
        assert!((0.0..=1.01).contains(&texel[1]));
    }
}

#[test]
fn scratch_read_back_returns_cleared_pixels() {
    let Some(ctx) = test_context() else { return };

    // 20 texels per row forces row padding (160 bytes -> 256).
    let scratch =
        ScratchRenderTarget::new(&ctx, 20, 4, wgpu::TextureFormat::Rgba16Float).unwrap();
    ctx.run_commands("Clear Scratch", |encoder| {
        let _pass = scratch.begin_pass(encoder, "Clear Pass");
    });

    let bytes = scratch.read_back(&ctx).unwrap();
    assert_eq!(bytes.len(), 20 * 4 * 8);
    let values = decode_f16(&bytes);
    for texel in values.chunks_exact(4) {
        assert_eq!(&texel[..3], &[0.0, 0.0, 0.0]);
    }
}

#[test]
fn rejects_malformed_environment_sources() {
    let Some(ctx) = test_context() else { return };

    assert!(EnvironmentSource::from_pixels(&ctx, 0, 2, &[]).is_err());
    // One float short of a 2x1 RGBA image.
    assert!(EnvironmentSource::from_pixels(&ctx, 2, 1, &[0.0; 7]).is_err());
    assert!(EnvironmentSource::from_pixels(&ctx, 2, 1, &[0.0; 8]).is_ok());
}
