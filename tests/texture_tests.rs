//! Integration tests for staged textures.
//!
//! # Test Categories
//!
//! - **Format Tests**: pixel format inference and data conversion
//! - **Upload Tests**: full uploads, sub-regions and their ordering
//! - **Parameter Tests**: sampling state across replacement and deletion
//! - **Capability Tests**: missing extensions and lost objects

mod common;

use rstest::rstest;

use common::{as_f32, init_logging, rgba8, Profile, TestContext};
use redlilium_staging::{
    get_format, DataOptions, DeviceCall, DummyDevice, Extent3d, FilterMode, HostArray, Origin3d,
    ParameterValue, PixelType, Resource, StagingError, StorageOptions, Texture, TextureFormat,
    TextureParameter, TextureTarget, WrapMode,
};

fn uploads(calls: &[DeviceCall]) -> Vec<&DeviceCall> {
    calls.iter().filter(|call| call.is_upload()).collect()
}

fn parameter_calls(calls: &[DeviceCall]) -> Vec<(TextureParameter, ParameterValue)> {
    calls
        .iter()
        .filter_map(|call| match call {
            DeviceCall::SetTextureParameter {
                parameter, value, ..
            } => Some((*parameter, *value)),
            _ => None,
        })
        .collect()
}

fn position(calls: &[DeviceCall], pred: impl Fn(&DeviceCall) -> bool) -> usize {
    calls
        .iter()
        .position(pred)
        .expect("expected device call was not recorded")
}

// ============================================================================
// Format Tests
// ============================================================================

#[rstest]
#[case::luminance_2d(&[4, 4], TextureTarget::D2, TextureFormat::Luminance)]
#[case::single_channel_2d(&[4, 4, 1], TextureTarget::D2, TextureFormat::Luminance)]
#[case::luminance_alpha_2d(&[4, 4, 2], TextureTarget::D2, TextureFormat::LuminanceAlpha)]
#[case::rgb_2d(&[4, 4, 3], TextureTarget::D2, TextureFormat::Rgb)]
#[case::rgba_2d(&[4, 4, 4], TextureTarget::D2, TextureFormat::Rgba)]
#[case::luminance_3d(&[2, 4, 4], TextureTarget::D3, TextureFormat::Luminance)]
#[case::rgba_3d(&[2, 4, 4, 4], TextureTarget::D3, TextureFormat::Rgba)]
fn test_format_inference(
    #[case] shape: &[usize],
    #[case] target: TextureTarget,
    #[case] expected: TextureFormat,
) {
    assert_eq!(get_format(shape, target).unwrap(), expected);
}

#[rstest]
#[case::five_channels(&[4, 4, 5], TextureTarget::D2)]
#[case::too_many_axes(&[4, 4, 4, 4], TextureTarget::D2)]
#[case::too_few_axes(&[4], TextureTarget::D2)]
fn test_format_inference_fails(#[case] shape: &[usize], #[case] target: TextureTarget) {
    assert!(matches!(
        get_format(shape, target),
        Err(StagingError::Format(_))
    ));
}

#[test]
fn test_set_data_rank_mismatch() {
    // (4, 4, 4) is a single-channel volume, (4, 4) is no volume at all.
    let mut volume = Texture::new_3d();
    volume
        .set_data(&rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    assert_eq!(volume.format(), Some(TextureFormat::Luminance));

    let flat = HostArray::from_slice(&[0u8; 16], &[4, 4]).unwrap();
    assert!(matches!(
        volume.set_data(&flat, DataOptions::default()),
        Err(StagingError::InvalidData(_))
    ));
    assert_eq!(volume.shape(), Some(&[4, 4, 4][..]));
}

#[rstest]
#[case::no_float(Profile::NoFloat)]
#[case::minimal(Profile::Minimal)]
fn test_int8_converted_to_uint8_without_float(#[case] profile: Profile) {
    let mut ctx = TestContext::new(profile);
    let data = HostArray::from_slice(&[-128i8, 127, -128, 127], &[2, 2]).unwrap();
    let mut texture = Texture::with_data(TextureTarget::D2, &data, DataOptions::default()).unwrap();
    assert!(!profile.has_float());
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    let upload = calls
        .iter()
        .find_map(|call| match call {
            DeviceCall::UploadTexture { ty, data, .. } => Some((*ty, data.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(upload.0, PixelType::UnsignedByte);
    assert_eq!(upload.1, vec![0, 255, 0, 255]);
}

#[test]
fn test_int8_converted_to_float_when_available() {
    let mut ctx = TestContext::full();
    let data = HostArray::from_slice(&[-128i8, 127], &[1, 2]).unwrap();
    let mut texture = Texture::with_data(TextureTarget::D2, &data, DataOptions::default()).unwrap();
    texture.activate(&mut ctx.device).unwrap();

    let (ty, bytes) = ctx
        .device
        .calls()
        .iter()
        .find_map(|call| match call {
            DeviceCall::UploadTexture { ty, data, .. } => Some((*ty, data.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(ty, PixelType::Float);
    assert_eq!(as_f32(&bytes), vec![0.0, 1.0]);
}

#[rstest]
#[case::full(Profile::Full)]
#[case::no_float(Profile::NoFloat)]
fn test_uint8_passes_through(#[case] profile: Profile) {
    let mut ctx = TestContext::new(profile);
    let data = rgba8(2, 2, 200);
    let mut texture = Texture::with_data(TextureTarget::D2, &data, DataOptions::default()).unwrap();
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    assert!(calls.contains(&DeviceCall::UploadTexture {
        target: TextureTarget::D2,
        level: 0,
        format: TextureFormat::Rgba,
        size: Extent3d::new_2d(2, 2),
        ty: PixelType::UnsignedByte,
        data: vec![200; 16],
    }));
}

// ============================================================================
// Upload Tests
// ============================================================================

#[test]
fn test_subdata_out_of_bounds_fails_before_upload() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::new_2d();
    texture
        .set_storage(&[64, 64, 4], StorageOptions::default())
        .unwrap();

    let err = texture
        .set_subdata(&[60, 0], &rgba8(8, 8, 1), DataOptions::default())
        .unwrap_err();
    assert!(matches!(err, StagingError::Bounds(_)));
    assert_eq!(texture.pending_regions(), 0);
    assert!(ctx.device.calls().is_empty());

    texture.activate(&mut ctx.device).unwrap();
    assert!(!ctx
        .device
        .calls()
        .iter()
        .any(|call| matches!(call, DeviceCall::UploadTextureSubregion { .. })));
}

#[test]
fn test_subdata_without_shape_fails() {
    let mut texture = Texture::new_2d();
    assert!(matches!(
        texture.set_subdata(&[0, 0], &rgba8(2, 2, 0), DataOptions::default()),
        Err(StagingError::InvalidOperation(_))
    ));
}

#[test]
fn test_subdata_offset_overflow_is_out_of_bounds() {
    let mut texture = Texture::with_storage(
        TextureTarget::D2,
        &[64, 64, 4],
        StorageOptions::default(),
    )
    .unwrap();
    let err = texture
        .set_subdata(&[usize::MAX, 0], &rgba8(1, 1, 0), DataOptions::default())
        .unwrap_err();
    assert!(matches!(err, StagingError::Bounds(_)));
    assert_eq!(texture.pending_regions(), 0);
}

#[test]
fn test_full_write_precedes_regions() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::new_2d();
    texture
        .set_data(&rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    texture
        .set_subdata(&[1, 2], &rgba8(2, 2, 9), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    let full = position(&calls, |c| matches!(c, DeviceCall::UploadTexture { .. }));
    let region = position(&calls, |c| {
        matches!(c, DeviceCall::UploadTextureSubregion { .. })
    });
    assert!(full < region);
    assert!(calls.contains(&DeviceCall::UploadTextureSubregion {
        target: TextureTarget::D2,
        level: 0,
        origin: Origin3d { x: 2, y: 1, z: 0 },
        size: Extent3d::new_2d(2, 2),
        format: TextureFormat::Rgba,
        ty: PixelType::UnsignedByte,
        data: vec![9; 16],
    }));
    assert_eq!(texture.pending_regions(), 0);
    assert!(!texture.needs_update());
}

#[test]
fn test_regions_precede_pending_parameters() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::with_data(TextureTarget::D2, &rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    ctx.take_calls();

    texture
        .set_filter(None, Some(FilterMode::Nearest))
        .unwrap();
    texture
        .set_subdata(&[0, 0], &rgba8(1, 4, 5), DataOptions::default())
        .unwrap();
    texture
        .set_subdata(&[3, 0], &rgba8(1, 4, 6), DataOptions::default())
        .unwrap();
    assert!(ctx.device.calls().is_empty());
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    let first = position(&calls, |c| {
        matches!(c, DeviceCall::UploadTextureSubregion { origin, .. } if origin.y == 0)
    });
    let second = position(&calls, |c| {
        matches!(c, DeviceCall::UploadTextureSubregion { origin, .. } if origin.y == 3)
    });
    let parameter = position(&calls, |c| {
        matches!(c, DeviceCall::SetTextureParameter { .. })
    });
    assert!(first < second);
    assert!(second < parameter);
    assert_eq!(
        parameter_calls(&calls),
        vec![(
            TextureParameter::MinFilter,
            ParameterValue::Filter(FilterMode::Nearest)
        )]
    );
    assert!(!texture.is_parameter_pending(TextureParameter::MinFilter));
}

#[test]
fn test_odd_row_length_sets_unpack_alignment() {
    let mut ctx = TestContext::full();
    let data = HostArray::from_slice(&[0u8; 27], &[3, 3, 3]).unwrap();
    let mut texture = Texture::with_data(TextureTarget::D2, &data, DataOptions::default()).unwrap();
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    let set = position(&calls, |c| *c == DeviceCall::SetUnpackAlignment(1));
    let upload = position(&calls, |c| matches!(c, DeviceCall::UploadTexture { .. }));
    let reset = position(&calls, |c| *c == DeviceCall::SetUnpackAlignment(4));
    assert!(set < upload && upload < reset);
}

#[test]
fn test_same_allocation_updates_in_place() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::with_data(TextureTarget::D2, &rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    let handle = texture.handle();
    ctx.take_calls();

    texture
        .set_data(&rgba8(4, 4, 7), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    assert_eq!(texture.handle(), handle);
    assert_eq!(
        uploads(&calls),
        vec![&DeviceCall::UploadTextureSubregion {
            target: TextureTarget::D2,
            level: 0,
            origin: Origin3d::ZERO,
            size: Extent3d::new_2d(4, 4),
            format: TextureFormat::Rgba,
            ty: PixelType::UnsignedByte,
            data: vec![7; 64],
        }]
    );
}

#[test]
fn test_storage_then_data_of_same_shape_updates_in_place() {
    let mut ctx = TestContext::full();
    let mut texture =
        Texture::with_storage(TextureTarget::D2, &[4, 4, 4], StorageOptions::default()).unwrap();
    texture.activate(&mut ctx.device).unwrap();
    assert!(ctx.device.calls().contains(&DeviceCall::AllocateTextureStorage {
        target: TextureTarget::D2,
        level: 0,
        format: TextureFormat::Rgba,
        size: Extent3d::new_2d(4, 4),
    }));
    ctx.take_calls();

    texture
        .set_data(&rgba8(4, 4, 3), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    let calls = ctx.take_calls();
    assert!(matches!(
        uploads(&calls)[..],
        [DeviceCall::UploadTextureSubregion { .. }]
    ));
}

#[test]
fn test_storage_with_same_shape_is_noop() {
    let mut texture = Texture::new_2d();
    texture
        .set_storage(&[16, 16, 4], StorageOptions::default())
        .unwrap();
    let mut ctx = TestContext::full();
    texture.activate(&mut ctx.device).unwrap();
    ctx.take_calls();

    texture
        .set_storage(&[16, 16], StorageOptions::default())
        .unwrap();
    assert!(!texture.has_pending_data());
    assert!(!texture.needs_update());
    assert_eq!(texture.format(), Some(TextureFormat::Rgba));

    // Explicit options always re-allocate.
    texture
        .set_storage(&[16, 16], StorageOptions::default().with_level(1))
        .unwrap();
    assert!(texture.has_pending_data());
}

#[test]
fn test_explicit_format_and_level() {
    let mut ctx = TestContext::full();
    let data = HostArray::from_slice(&[255u8; 16], &[4, 4]).unwrap();
    let options = DataOptions::default()
        .with_level(2)
        .with_format(TextureFormat::Alpha);
    let mut texture = Texture::with_data(TextureTarget::D2, &data, options).unwrap();
    assert_eq!(texture.format(), Some(TextureFormat::Alpha));
    texture.activate(&mut ctx.device).unwrap();

    assert!(ctx.device.calls().iter().any(|call| matches!(
        call,
        DeviceCall::UploadTexture {
            level: 2,
            format: TextureFormat::Alpha,
            ..
        }
    )));
}

// ============================================================================
// Parameter Tests
// ============================================================================

#[test]
fn test_parameters_reapplied_after_replacement() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::with_data(TextureTarget::D2, &rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    texture
        .set_wrapping(Some(WrapMode::Repeat), None, None)
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    let first = texture.handle().unwrap();
    ctx.take_calls();

    texture
        .set_data(&rgba8(8, 8, 0), DataOptions::default())
        .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    let second = texture.handle().unwrap();
    assert_ne!(first, second);

    let calls = ctx.take_calls();
    assert!(calls.contains(&DeviceCall::DeleteTexture(first)));
    assert!(calls.contains(&DeviceCall::CreateTexture(second)));
    assert_eq!(
        parameter_calls(&calls),
        vec![
            (
                TextureParameter::MagFilter,
                ParameterValue::Filter(FilterMode::Linear)
            ),
            (
                TextureParameter::MinFilter,
                ParameterValue::Filter(FilterMode::Linear)
            ),
            (
                TextureParameter::WrapS,
                ParameterValue::Wrap(WrapMode::Repeat)
            ),
            (
                TextureParameter::WrapT,
                ParameterValue::Wrap(WrapMode::ClampToEdge)
            ),
        ]
    );
    assert_eq!(ctx.device.live_texture_count(), 1);
}

#[test]
fn test_delete_repends_parameters() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::new_3d();
    texture.activate(&mut ctx.device).unwrap();
    assert!(!texture.is_parameter_pending(TextureParameter::WrapR));

    texture.delete(&mut ctx.device).unwrap();
    texture.delete(&mut ctx.device).unwrap();
    assert!(texture.is_parameter_pending(TextureParameter::WrapR));
    assert!(texture.needs_update());
    assert_eq!(ctx.device.live_texture_count(), 0);

    ctx.take_calls();
    texture.activate(&mut ctx.device).unwrap();
    assert_eq!(parameter_calls(&ctx.take_calls()).len(), 5);
}

#[test]
fn test_subdata_after_delete_reallocates_storage() {
    let mut ctx = TestContext::full();
    let mut texture = Texture::with_data(
        TextureTarget::D2,
        &rgba8(4, 4, 0),
        DataOptions::default(),
    )
    .unwrap();
    texture.activate(&mut ctx.device).unwrap();
    texture.delete(&mut ctx.device).unwrap();

    texture
        .set_subdata(&[1, 1], &rgba8(2, 2, 7), DataOptions::default())
        .unwrap();
    ctx.take_calls();
    texture.activate(&mut ctx.device).unwrap();

    let calls = ctx.take_calls();
    let storage = position(&calls, |c| {
        matches!(c, DeviceCall::AllocateTextureStorage { .. })
    });
    let region = position(&calls, |c| {
        matches!(c, DeviceCall::UploadTextureSubregion { .. })
    });
    assert!(storage < region);
    assert!(calls.contains(&DeviceCall::AllocateTextureStorage {
        target: TextureTarget::D2,
        level: 0,
        format: TextureFormat::Rgba,
        size: Extent3d::new_2d(4, 4),
    }));
    assert_eq!(ctx.device.live_texture_count(), 1);
    assert!(!texture.needs_update());
}

#[rstest]
#[case::mipmap_mag(Some(FilterMode::LinearMipmapLinear), None)]
#[case::nearest_mipmap_mag(Some(FilterMode::NearestMipmapNearest), Some(FilterMode::Linear))]
fn test_mipmap_mag_filter_rejected(
    #[case] mag: Option<FilterMode>,
    #[case] min: Option<FilterMode>,
) {
    let mut texture = Texture::new_2d();
    assert!(matches!(
        texture.set_filter(mag, min),
        Err(StagingError::InvalidOperation(_))
    ));
    assert_eq!(
        texture.parameter(TextureParameter::MinFilter),
        Some(ParameterValue::Filter(FilterMode::Linear))
    );
}

#[test]
fn test_r_wrap_requires_3d() {
    let mut texture = Texture::new_2d();
    assert!(matches!(
        texture.set_wrapping(None, None, Some(WrapMode::Repeat)),
        Err(StagingError::InvalidOperation(_))
    ));
    let mut volume = Texture::new_3d();
    volume
        .set_wrapping(None, None, Some(WrapMode::MirroredRepeat))
        .unwrap();
    assert_eq!(
        volume.parameter(TextureParameter::WrapR),
        Some(ParameterValue::Wrap(WrapMode::MirroredRepeat))
    );
}

// ============================================================================
// Capability Tests
// ============================================================================

#[test]
fn test_3d_texture_requires_extension() {
    let mut ctx = TestContext::new(Profile::Minimal);
    let mut texture = Texture::new_3d();

    assert!(matches!(
        texture.create(&mut ctx.device),
        Err(StagingError::Capability(_))
    ));
    assert!(matches!(
        texture.activate(&mut ctx.device),
        Err(StagingError::Capability(_))
    ));
    assert!(ctx.device.calls().is_empty());
    assert!(!texture.is_valid());
}

#[test]
fn test_3d_texture_with_extension() {
    let mut ctx = TestContext::new(Profile::NoFloat);
    let data = HostArray::from_slice(&[1u8; 32], &[2, 4, 4]).unwrap();
    let mut texture = Texture::with_data(TextureTarget::D3, &data, DataOptions::default()).unwrap();
    texture.activate(&mut ctx.device).unwrap();
    assert!(ctx.device.calls().contains(&DeviceCall::UploadTexture {
        target: TextureTarget::D3,
        level: 0,
        format: TextureFormat::Luminance,
        size: Extent3d::new_3d(4, 4, 2),
        ty: PixelType::UnsignedByte,
        data: vec![1; 32],
    }));
}

#[test]
fn test_lost_texture_degrades_to_inert() {
    init_logging();
    let mut device = DummyDevice::new().with_lost_texture_uploads(true);
    let mut texture = Texture::with_data(TextureTarget::D2, &rgba8(4, 4, 0), DataOptions::default())
        .unwrap();
    texture
        .set_subdata(&[0, 0], &rgba8(2, 2, 1), DataOptions::default())
        .unwrap();

    texture.activate(&mut device).unwrap();
    assert!(!texture.is_valid());
    assert_eq!(texture.handle(), None);
    assert_eq!(texture.pending_regions(), 0);
    assert!(!device
        .calls()
        .iter()
        .any(|call| matches!(call, DeviceCall::UploadTextureSubregion { .. })));
}
