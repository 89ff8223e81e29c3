//! Bridge WASM <-> JavaScript trung lập framework.

use recon_core::{DedupConfig, NormalizedBundle, ReconcileError};
use recon_fhir::{normalize_bundle_sync, reconcile, RawBundle};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

/// Chuẩn hoá dữ liệu của một kết nối (Bundle FHIR hoặc object theo loại),
/// chỉ dùng bảng thuật ngữ cục bộ.
#[wasm_bindgen(js_name = normalizeBundle)]
pub fn normalize_bundle(input_bundle: JsValue, source: String) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let value = from_value::<serde_json::Value>(input_bundle)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON bundle: {err}")))?;
    let raw = RawBundle::from_value(value).map_err(format_error)?;

    to_js(&normalize_bundle_sync(&raw, &source))
}

/// Đối soát một mảng bundle đã chuẩn hoá. `config` có thể ghi đè ngưỡng so
/// khớp; trường bỏ trống giữ giá trị mặc định.
#[wasm_bindgen(js_name = reconcileBundles)]
pub fn reconcile_bundles(bundles: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let bundles: Vec<NormalizedBundle> = from_value(bundles)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được danh sách bundle: {err}")))?;

    let config = match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            from_value::<DedupConfig>(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?
        }
        _ => DedupConfig::default(),
    };

    to_js(&reconcile(&bundles, &config))
}

/// Serialize map thành object thường để JS đọc `_meta` và bản ghi tự nhiên.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize được kết quả: {err}")))
}

fn format_error(err: ReconcileError) -> JsValue {
    JsValue::from_str(&format!("Lỗi đối soát: {err}"))
}
