//! Formatter Module
//!
//! Excelのシリアル値と暦日時の相互変換を行うモジュール。
//! 解決された書式の種類に応じて、数値セルを日付・日時・時刻・経過時間に変換します。

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::parser::styles::NumberFormatKind;
use crate::types::Cell;

/// 1日の秒数
const SECONDS_PER_DAY: i64 = 86_400;

/// 日数の計算上限（chronoの表現範囲より十分大きく、`Duration::days`が溢れない値）
const MAX_DAY_SPAN: f64 = 200_000_000.0;

/// ワークブックの日付システム
///
/// `xl/workbook.xml`の`<workbookPr date1904="1"/>`で切り替わります。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateSystem {
    /// 1900年システム（デフォルト）
    ///
    /// エポックは1899年12月30日。Excelはシリアル値60を存在しない
    /// 1900年2月29日として扱うため、61以降の値はExcelの表示と一致し、
    /// 60以下の値はExcelの表示より1日前の日付になります。
    /// シリアル値60は1900年2月28日に、シリアル値1は1899年12月31日になります。
    #[default]
    V1900,

    /// 1904年システム（旧Mac版Excel）
    ///
    /// エポックは1904年1月1日。うるう日の補正はありません。
    V1904,
}

impl DateSystem {
    fn epoch(self) -> NaiveDate {
        let epoch = match self {
            DateSystem::V1900 => NaiveDate::from_ymd_opt(1899, 12, 30),
            DateSystem::V1904 => NaiveDate::from_ymd_opt(1904, 1, 1),
        };
        epoch.unwrap_or(NaiveDate::MIN)
    }
}

/// シリアル値コーデック
///
/// # 変換規則
///
/// - 整数部: エポックからの日数（負の値は切り捨て方向に丸める）
/// - 小数部: `× 86400`を秒単位に四捨五入した時刻。86400秒に達した場合は翌日に繰り上げ
/// - 表現範囲外の値は`NaiveDateTime::MIN`/`MAX`に飽和させる（失敗はしない）
#[derive(Debug, Clone, Copy, Default)]
pub struct DateCodec {
    system: DateSystem,
}

impl DateCodec {
    /// 指定された日付システムのコーデックを生成
    pub fn new(system: DateSystem) -> Self {
        Self { system }
    }

    /// 日付システムを取得
    pub fn system(&self) -> DateSystem {
        self.system
    }

    /// シリアル値を日時に変換
    ///
    /// `NaN`はエポックとして扱います。呼び出し側で事前に除外してください。
    pub fn to_datetime(&self, serial: f64) -> NaiveDateTime {
        if serial.is_nan() {
            return midnight(self.system.epoch()).unwrap_or(NaiveDateTime::MIN);
        }

        let whole = serial.floor();
        let mut seconds = ((serial - whole) * SECONDS_PER_DAY as f64).round() as i64;
        let mut days = whole.clamp(-MAX_DAY_SPAN, MAX_DAY_SPAN) as i64;
        if seconds >= SECONDS_PER_DAY {
            days += 1;
            seconds -= SECONDS_PER_DAY;
        }

        let date = match self
            .system
            .epoch()
            .checked_add_signed(Duration::days(days))
        {
            Some(date) => date,
            None if days < 0 => return NaiveDateTime::MIN,
            None => return NaiveDateTime::MAX,
        };

        midnight(date)
            .and_then(|start| start.checked_add_signed(Duration::seconds(seconds)))
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// 日時をシリアル値に変換
    pub fn to_serial(&self, timestamp: NaiveDateTime) -> f64 {
        let days = (timestamp.date() - self.system.epoch()).num_days();
        let seconds = timestamp.num_seconds_from_midnight() as f64
            + timestamp.nanosecond() as f64 / 1_000_000_000.0;
        days as f64 + seconds / SECONDS_PER_DAY as f64
    }

    /// 数値セルの生の値を書式の種類に従ってデコード
    ///
    /// # 戻り値
    ///
    /// - `Plain`: 元の10進文字列のままの`Cell::Number`
    /// - `DateTime`: 時刻部分がなければ`Cell::Date`、整数部が0なら`Cell::Time`、
    ///   それ以外は`Cell::DateTime`
    /// - `Duration`: `Cell::Duration`（時間は24を超え得る）
    ///
    /// 数値として解析できない値は`Cell::Text`、非有限値は`Cell::Number`として
    /// 生の値のまま返します。
    pub fn decode(&self, raw: &str, kind: NumberFormatKind) -> Cell {
        let serial: f64 = match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => return Cell::Text(raw.to_string()),
        };
        if !serial.is_finite() {
            return Cell::Number(raw.to_string());
        }

        match kind {
            NumberFormatKind::Plain => Cell::Number(raw.to_string()),
            NumberFormatKind::Duration => Cell::Duration(format_elapsed(serial)),
            NumberFormatKind::DateTime => {
                let timestamp = self.to_datetime(serial);
                if timestamp.num_seconds_from_midnight() == 0 {
                    Cell::Date(timestamp.format("%Y-%m-%d").to_string())
                } else if (0.0..1.0).contains(&serial) {
                    Cell::Time(timestamp.format("%H:%M:%S").to_string())
                } else {
                    Cell::DateTime(timestamp.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            }
        }
    }
}

fn midnight(date: NaiveDate) -> Option<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
}

/// 経過時間を`HH:MM:SS`形式に変換（時間は24を超え得る）
fn format_elapsed(serial: f64) -> String {
    let total = (serial * SECONDS_PER_DAY as f64).round();
    let sign = if total < 0.0 { "-" } else { "" };
    let total = total.abs().min(i64::MAX as f64) as i64;

    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_date(raw: &str) -> Cell {
        DateCodec::default().decode(raw, NumberFormatKind::DateTime)
    }

    #[test]
    fn test_decode_datetime_exact_second() {
        assert_eq!(
            decode_date("45834.614583333"),
            Cell::DateTime("2025-06-26 14:45:00".to_string())
        );
    }

    #[test]
    fn test_decode_pure_date() {
        assert_eq!(decode_date("42657"), Cell::Date("2016-10-14".to_string()));
        assert_eq!(decode_date("45658"), Cell::Date("2025-01-01".to_string()));
    }

    #[test]
    fn test_decode_time_only() {
        assert_eq!(
            decode_date("0.41666666666666669"),
            Cell::Time("10:00:00".to_string())
        );
    }

    #[test]
    fn test_1900_leap_day_quirk() {
        // エポック1899-12-30基準
        assert_eq!(decode_date("1"), Cell::Date("1899-12-31".to_string()));
        assert_eq!(decode_date("59"), Cell::Date("1900-02-27".to_string()));
        assert_eq!(decode_date("60"), Cell::Date("1900-02-28".to_string()));
        assert_eq!(decode_date("61"), Cell::Date("1900-03-01".to_string()));
    }

    #[test]
    fn test_1904_epoch() {
        let codec = DateCodec::new(DateSystem::V1904);
        assert_eq!(
            codec.decode("0", NumberFormatKind::DateTime),
            Cell::Date("1904-01-01".to_string())
        );
        assert_eq!(
            codec.decode("365", NumberFormatKind::DateTime),
            Cell::Date("1904-12-31".to_string())
        );
    }

    #[test]
    fn test_rounding_carries_into_next_day() {
        assert_eq!(
            decode_date("45657.999999999"),
            Cell::Date("2025-01-01".to_string())
        );
    }

    #[test]
    fn test_negative_serial_floors() {
        // -0.5 = エポック前日の正午
        assert_eq!(
            decode_date("-0.5"),
            Cell::DateTime("1899-12-29 12:00:00".to_string())
        );
    }

    #[test]
    fn test_out_of_range_serials_clamp() {
        let codec = DateCodec::default();
        assert_eq!(codec.to_datetime(1e300), NaiveDateTime::MAX);
        assert_eq!(codec.to_datetime(-1e300), NaiveDateTime::MIN);
        assert_eq!(codec.to_datetime(f64::INFINITY), NaiveDateTime::MAX);
    }

    #[test]
    fn test_decode_non_numeric_degrades() {
        assert_eq!(decode_date("abc"), Cell::Text("abc".to_string()));
        assert_eq!(decode_date("NaN"), Cell::Number("NaN".to_string()));
    }

    #[test]
    fn test_decode_plain_keeps_raw_text() {
        let codec = DateCodec::default();
        assert_eq!(
            codec.decode("0.10000000000000001", NumberFormatKind::Plain),
            Cell::Number("0.10000000000000001".to_string())
        );
    }

    #[test]
    fn test_decode_duration() {
        let codec = DateCodec::default();
        assert_eq!(
            codec.decode("1.5", NumberFormatKind::Duration),
            Cell::Duration("36:00:00".to_string())
        );
        assert_eq!(
            codec.decode("-0.25", NumberFormatKind::Duration),
            Cell::Duration("-06:00:00".to_string())
        );
    }

    #[test]
    fn test_to_serial_inverse() {
        let codec = DateCodec::default();
        let timestamp = NaiveDate::from_ymd_opt(2025, 6, 26)
            .unwrap()
            .and_hms_opt(14, 45, 0)
            .unwrap();
        let serial = codec.to_serial(timestamp);
        assert!((serial - 45834.614583333).abs() < 1e-6);
        assert_eq!(codec.to_datetime(serial), timestamp);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_date_conversion_monotonicity(
                serial1 in -100000.0f64..3000000.0,
                serial2 in -100000.0f64..3000000.0
            ) {
                let codec = DateCodec::default();
                let date1 = codec.to_datetime(serial1);
                let date2 = codec.to_datetime(serial2);

                if serial1 <= serial2 {
                    prop_assert!(date1 <= date2,
                        "Date monotonicity violated: serial1={} ({}) <= serial2={} ({})",
                        serial1, date1, serial2, date2);
                } else {
                    prop_assert!(date1 >= date2,
                        "Date monotonicity violated: serial1={} ({}) > serial2={} ({})",
                        serial1, date1, serial2, date2);
                }
            }

            #[test]
            fn test_serial_round_trip_to_second(serial in 0.0f64..2958465.0) {
                for system in [DateSystem::V1900, DateSystem::V1904] {
                    let codec = DateCodec::new(system);
                    let timestamp = codec.to_datetime(serial);
                    let back = codec.to_serial(timestamp);
                    prop_assert!((back - serial).abs() <= 0.5 / 86400.0 + 1e-9);
                }
            }
        }
    }
}
