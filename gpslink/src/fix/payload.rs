//! JSON marshalling for client-facing fix payloads.
//!
//! Key names are the wire contract inherited from the service's original
//! consumers (`"visible satellites"`, `"heading (true north)"`, ...), so
//! they are spelled out here rather than derived from field names.
//!
//! Fields the receiver did not report are omitted from the payload. Some
//! legacy dashboards expect every key to be present; the `emit_null_fields`
//! compatibility flag emits JSON `null` for missing fields instead.

use serde_json::{json, Map, Value};

use super::{Fix, FixMode};

fn put(obj: &mut Map<String, Value>, emit_null: bool, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            obj.insert(key.to_string(), v);
        }
        None if emit_null => {
            obj.insert(key.to_string(), Value::Null);
        }
        None => {}
    }
}

/// Build the client-facing JSON payload for a fix.
///
/// Returns `None` for a fix below 2D - "no fix" means no payload, never a
/// partially filled object.
///
/// Altitude and climb are only meaningful on a 3D fix and are withheld
/// otherwise, even when the daemon reported values.
pub fn fix_payload(fix: &Fix, emit_null_fields: bool) -> Option<Value> {
    if !fix.is_valid() {
        return None;
    }

    let nulls = emit_null_fields;
    let mut obj = Map::new();

    put(
        &mut obj,
        nulls,
        "visible satellites",
        fix.satellites_visible.map(Value::from),
    );
    put(
        &mut obj,
        nulls,
        "used satellites",
        fix.satellites_used.map(Value::from),
    );

    put(&mut obj, nulls, "latitude", fix.latitude.map(Value::from));
    put(
        &mut obj,
        nulls,
        "latitude error",
        fix.latitude_error.map(Value::from),
    );
    put(&mut obj, nulls, "longitude", fix.longitude.map(Value::from));
    put(
        &mut obj,
        nulls,
        "longitude error",
        fix.longitude_error.map(Value::from),
    );

    put(&mut obj, nulls, "speed", fix.speed.map(Value::from));
    put(
        &mut obj,
        nulls,
        "speed error",
        fix.speed_error.map(Value::from),
    );

    if fix.mode == FixMode::ThreeDimensional {
        put(&mut obj, nulls, "altitude", fix.altitude.map(Value::from));
        put(
            &mut obj,
            nulls,
            "altitude error",
            fix.altitude_error.map(Value::from),
        );
        put(&mut obj, nulls, "climb", fix.climb.map(Value::from));
        put(
            &mut obj,
            nulls,
            "climb error",
            fix.climb_error.map(Value::from),
        );
    }

    put(
        &mut obj,
        nulls,
        "heading (true north)",
        fix.track.map(Value::from),
    );
    put(
        &mut obj,
        nulls,
        "heading error",
        fix.track_error.map(Value::from),
    );

    put(&mut obj, nulls, "timestamp", fix.time.map(Value::from));
    put(
        &mut obj,
        nulls,
        "timestamp error",
        fix.time_error.map(Value::from),
    );

    obj.insert("mode".to_string(), json!(fix.mode.as_raw()));

    Some(Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_fix() -> Fix {
        Fix {
            mode: FixMode::ThreeDimensional,
            satellites_visible: Some(11),
            satellites_used: Some(7),
            latitude: Some(53.5),
            latitude_error: Some(4.0),
            longitude: Some(10.0),
            longitude_error: Some(3.5),
            speed: Some(12.5),
            speed_error: Some(0.5),
            altitude: Some(120.0),
            altitude_error: Some(9.0),
            climb: Some(-0.2),
            climb_error: Some(0.1),
            track: Some(270.0),
            track_error: Some(2.0),
            time: Some(1_700_000_000.25),
            time_error: Some(0.005),
        }
    }

    #[test]
    fn test_no_fix_yields_no_payload() {
        assert!(fix_payload(&Fix::default(), false).is_none());
        assert!(fix_payload(&Fix::default(), true).is_none());
    }

    #[test]
    fn test_full_payload_key_names() {
        let payload = fix_payload(&full_fix(), false).expect("3D fix should marshal");
        let obj = payload.as_object().expect("payload is an object");

        for key in [
            "visible satellites",
            "used satellites",
            "mode",
            "latitude",
            "latitude error",
            "longitude",
            "longitude error",
            "speed",
            "speed error",
            "altitude",
            "altitude error",
            "climb",
            "climb error",
            "heading (true north)",
            "heading error",
            "timestamp",
            "timestamp error",
        ] {
            assert!(obj.contains_key(key), "Missing key: {}", key);
        }

        assert_eq!(obj["mode"], json!(3));
        assert_eq!(obj["latitude"], json!(53.5));
        assert_eq!(obj["heading (true north)"], json!(270.0));
    }

    #[test]
    fn test_missing_fields_are_omitted() {
        let fix = Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(53.5),
            longitude: Some(10.0),
            ..Default::default()
        };

        let payload = fix_payload(&fix, false).unwrap();
        let obj = payload.as_object().unwrap();

        assert!(obj.contains_key("latitude"));
        assert!(!obj.contains_key("speed"));
        assert!(!obj.contains_key("timestamp"));
    }

    #[test]
    fn test_null_compatibility_mode() {
        let fix = Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(53.5),
            longitude: Some(10.0),
            ..Default::default()
        };

        let payload = fix_payload(&fix, true).unwrap();
        let obj = payload.as_object().unwrap();

        assert_eq!(obj["speed"], Value::Null);
        assert_eq!(obj["timestamp"], Value::Null);
        assert_eq!(obj["latitude"], json!(53.5));
    }

    #[test]
    fn test_altitude_withheld_below_3d() {
        let fix = Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(53.5),
            longitude: Some(10.0),
            altitude: Some(120.0),
            climb: Some(1.0),
            ..Default::default()
        };

        let payload = fix_payload(&fix, false).unwrap();
        let obj = payload.as_object().unwrap();

        assert!(!obj.contains_key("altitude"));
        assert!(!obj.contains_key("climb"));
        assert_eq!(obj["mode"], json!(2));
    }

    #[test]
    fn test_altitude_null_compat_only_on_3d() {
        // Below 3D the altitude block is withheld entirely, even in
        // null-compatibility mode
        let fix = Fix {
            mode: FixMode::TwoDimensional,
            latitude: Some(53.5),
            longitude: Some(10.0),
            ..Default::default()
        };

        let payload = fix_payload(&fix, true).unwrap();
        assert!(!payload.as_object().unwrap().contains_key("altitude"));
    }
}
