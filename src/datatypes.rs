use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read};

/// 字段类型（由外部解码阶段给出）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// u32 字节数前缀 + Windows-1252 文本
    Text,
    /// u32 字符数前缀 + UTF-16LE 文本
    WideText,
    /// 32 位有符号整数
    Int,
    /// 32 位浮点数
    Float,
    /// 原样写入
    Raw,
}

/// 用户提交的字段值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Int(i32),
    Float(f32),
    Raw(Vec<u8>),
}

/// 已编码的字段值：类型 + 原始字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    pub kind: FieldKind,
    pub bytes: Vec<u8>,
}

impl FieldValue {
    /// 按字段类型编码
    ///
    /// 值与类型不兼容时返回 None（例如给整数字段传文本）。
    /// `Raw` 值可以写入任意类型字段，整数可以写入浮点字段。
    pub fn encode(&self, kind: FieldKind) -> Option<EncodedValue> {
        let bytes = match (kind, self) {
            (_, FieldValue::Raw(bytes)) => encode_raw(bytes),
            (FieldKind::Text, FieldValue::Text(s)) => encode_text(s)?,
            (FieldKind::WideText, FieldValue::Text(s)) => encode_wide_text(s),
            (FieldKind::Int, FieldValue::Int(v)) => encode_int(*v),
            (FieldKind::Float, FieldValue::Float(v)) => encode_float(*v),
            (FieldKind::Float, FieldValue::Int(v)) => encode_float(*v as f32),
            _ => return None,
        };
        Some(EncodedValue { kind, bytes })
    }

    /// 按字段类型从原始字节解码（用于展示当前值）
    pub fn decode(kind: FieldKind, data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(data);
        match kind {
            FieldKind::Text => {
                let length = cursor.read_u32::<LittleEndian>().ok()? as usize;
                if length > data.len() - 4 {
                    return None;
                }
                let mut payload = vec![0u8; length];
                cursor.read_exact(&mut payload).ok()?;
                let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(&payload);
                Some(FieldValue::Text(decoded.into_owned()))
            }
            FieldKind::WideText => {
                let units = cursor.read_u32::<LittleEndian>().ok()? as usize;
                let byte_len = units.checked_mul(2)?;
                if byte_len > data.len() - 4 {
                    return None;
                }
                let mut payload = vec![0u8; byte_len];
                cursor.read_exact(&mut payload).ok()?;
                let (decoded, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&payload);
                Some(FieldValue::Text(decoded.into_owned()))
            }
            FieldKind::Int => cursor.read_i32::<LittleEndian>().ok().map(FieldValue::Int),
            FieldKind::Float => cursor.read_f32::<LittleEndian>().ok().map(FieldValue::Float),
            FieldKind::Raw => Some(FieldValue::Raw(data.to_vec())),
        }
    }
}

/// Windows-1252 文本，u32 字节数前缀
///
/// 含有无法映射的字符时返回 None。
pub fn encode_text(text: &str) -> Option<Vec<u8>> {
    let (payload, _, had_errors) = encoding_rs::WINDOWS_1252.encode(text);
    if had_errors {
        return None;
    }
    let mut out = vec![0u8; 4];
    LittleEndian::write_u32(&mut out, payload.len() as u32);
    out.extend_from_slice(&payload);
    Some(out)
}

/// UTF-16LE 文本，u32 代码单元数前缀
pub fn encode_wide_text(text: &str) -> Vec<u8> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let mut out = vec![0u8; 4 + units.len() * 2];
    LittleEndian::write_u32(&mut out[..4], units.len() as u32);
    LittleEndian::write_u16_into(&units, &mut out[4..]);
    out
}

pub fn encode_int(value: i32) -> Vec<u8> {
    let mut out = vec![0u8; 4];
    LittleEndian::write_i32(&mut out, value);
    out
}

pub fn encode_float(value: f32) -> Vec<u8> {
    let mut out = vec![0u8; 4];
    LittleEndian::write_f32(&mut out, value);
    out
}

pub fn encode_raw(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text() {
        let encoded = FieldValue::Text("Hero".to_string()).encode(FieldKind::Text).unwrap();
        assert_eq!(encoded.kind, FieldKind::Text);
        assert_eq!(encoded.bytes, vec![4, 0, 0, 0, b'H', b'e', b'r', b'o']);
    }

    #[test]
    fn test_encode_text_windows_1252() {
        let encoded = encode_text("Zoë").unwrap();
        assert_eq!(encoded, vec![3, 0, 0, 0, b'Z', b'o', 0xEB]);

        // 超出 Windows-1252 的字符无法编码
        assert!(encode_text("铁剑").is_none());
    }

    #[test]
    fn test_encode_wide_text() {
        let encoded = encode_wide_text("Ab");
        assert_eq!(encoded, vec![2, 0, 0, 0, b'A', 0, b'b', 0]);
    }

    #[test]
    fn test_encode_numbers() {
        assert_eq!(encode_int(-2), vec![0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode_float(1.0), 1.0f32.to_le_bytes().to_vec());

        let widened = FieldValue::Int(3).encode(FieldKind::Float).unwrap();
        assert_eq!(widened.bytes, 3.0f32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_raw_passthrough_any_kind() {
        let raw = FieldValue::Raw(vec![9, 8, 7]);
        assert_eq!(raw.encode(FieldKind::Int).unwrap().bytes, vec![9, 8, 7]);
        assert_eq!(raw.encode(FieldKind::WideText).unwrap().bytes, vec![9, 8, 7]);
    }

    #[test]
    fn test_kind_mismatch() {
        assert!(FieldValue::Text("x".into()).encode(FieldKind::Int).is_none());
        assert!(FieldValue::Float(1.5).encode(FieldKind::Int).is_none());
        assert!(FieldValue::Int(1).encode(FieldKind::Text).is_none());
    }

    #[test]
    fn test_decode_values() {
        let wide = encode_wide_text("Hero");
        assert_eq!(
            FieldValue::decode(FieldKind::WideText, &wide),
            Some(FieldValue::Text("Hero".to_string()))
        );
        assert_eq!(
            FieldValue::decode(FieldKind::Int, &encode_int(42)),
            Some(FieldValue::Int(42))
        );
        // 长度前缀超出数据
        assert_eq!(FieldValue::decode(FieldKind::Text, &[9, 0, 0, 0, b'a']), None);
    }

    #[test]
    fn test_decode_rejects_oversized_prefix() {
        let mut data = 0x7FFF_FFFFu32.to_le_bytes().to_vec();
        data.extend(b"abcd");
        assert_eq!(FieldValue::decode(FieldKind::Text, &data), None);
        assert_eq!(FieldValue::decode(FieldKind::WideText, &data), None);

        // 前缀比实际数据多一个单位
        let mut short = 3u32.to_le_bytes().to_vec();
        short.extend([b'a', 0, b'b', 0]);
        assert_eq!(FieldValue::decode(FieldKind::WideText, &short), None);
        assert_eq!(
            FieldValue::decode(FieldKind::WideText, &encode_wide_text("ab")),
            Some(FieldValue::Text("ab".to_string()))
        );
    }

    #[test]
    fn test_field_value_json() {
        let value: FieldValue = serde_json::from_str(r#"{"text":"Hero"}"#).unwrap();
        assert_eq!(value, FieldValue::Text("Hero".to_string()));
        let kind: FieldKind = serde_json::from_str(r#""wide_text""#).unwrap();
        assert_eq!(kind, FieldKind::WideText);
    }
}
