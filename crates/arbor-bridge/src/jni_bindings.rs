//! JNI bindings for the Android capture app.

use jni::objects::{JByteBuffer, JIntArray, JObject, JObjectArray};
use jni::sys::jint;
use jni::JNIEnv;

use crate::error::BridgeError;
use crate::image::{ImageDesc, ImagePlane};
use crate::process::process_image_pair;

fn read_int_array(env: &mut JNIEnv, array: &JIntArray) -> Result<Vec<i32>, BridgeError> {
    let len = env.get_array_length(array)? as usize;
    let mut buf = vec![0i32; len];
    env.get_int_array_region(array, 0, &mut buf)?;
    Ok(buf)
}

/// Marshal one managed image across the boundary: the info array holds
/// `[format, width, height]`, the stride arrays one entry per plane, and the
/// buffer array the planes' direct ByteBuffers, whose contents are copied
/// into native memory.
fn image_from_jni(
    env: &mut JNIEnv,
    info: &JIntArray,
    pixel_stride: &JIntArray,
    row_stride: &JIntArray,
    buffers: &JObjectArray,
) -> Result<ImageDesc, BridgeError> {
    let info = read_int_array(env, info)?;
    if info.len() < 3 {
        return Err(BridgeError::InvalidImage(format!(
            "info array holds {} entries, expected 3",
            info.len()
        )));
    }

    let pixel_strides = read_int_array(env, pixel_stride)?;
    let row_strides = read_int_array(env, row_stride)?;
    let num_planes = env.get_array_length(buffers)? as usize;
    if pixel_strides.len() != num_planes || row_strides.len() != num_planes {
        return Err(BridgeError::InvalidImage(format!(
            "stride arrays ({}, {}) do not match {} buffers",
            pixel_strides.len(),
            row_strides.len(),
            num_planes
        )));
    }

    let mut planes = Vec::with_capacity(num_planes);
    for i in 0..num_planes {
        let buffer = JByteBuffer::from(env.get_object_array_element(buffers, i as i32)?);
        let address = env.get_direct_buffer_address(&buffer)?;
        let capacity = env.get_direct_buffer_capacity(&buffer)?;

        // SAFETY: address/capacity describe the direct buffer the JVM just
        // handed us; the contents are copied before the local ref is dropped.
        let data = unsafe { std::slice::from_raw_parts(address, capacity) }.to_vec();

        planes.push(ImagePlane {
            pixel_stride: pixel_strides[i],
            row_stride: row_strides[i],
            data,
        });
    }

    Ok(ImageDesc {
        format: info[0],
        width: info[1],
        height: info[2],
        planes,
    })
}

/// Process an RGB + ToF image pair handed over from the capture activity.
///
/// Returns 1 on success; on failure a `RuntimeException` is thrown into the
/// JVM and 0 is returned.
#[no_mangle]
pub extern "system" fn Java_com_trees_common_jni_ImageProcessor_nativeProcessImage<'local>(
    mut env: JNIEnv<'local>,
    _this: JObject<'local>,
    rgb_info: JIntArray<'local>,
    rgb_pixel_stride: JIntArray<'local>,
    rgb_row_stride: JIntArray<'local>,
    rgb_buffers: JObjectArray<'local>,
    tof_info: JIntArray<'local>,
    tof_pixel_stride: JIntArray<'local>,
    tof_row_stride: JIntArray<'local>,
    tof_buffers: JObjectArray<'local>,
) -> jint {
    let result = (|| -> Result<(), BridgeError> {
        let rgb = image_from_jni(
            &mut env,
            &rgb_info,
            &rgb_pixel_stride,
            &rgb_row_stride,
            &rgb_buffers,
        )?;
        let tof = image_from_jni(
            &mut env,
            &tof_info,
            &tof_pixel_stride,
            &tof_row_stride,
            &tof_buffers,
        )?;

        process_image_pair(&rgb, &tof)?;
        Ok(())
    })();

    match result {
        Ok(()) => 1,
        Err(e) => {
            log::error!("native image processing failed: {e}");
            let _ = env.throw_new("java/lang/RuntimeException", e.to_string());
            0
        }
    }
}
