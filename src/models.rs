//! Sensor catalogue and reading models for the heating system.
//!
//! The sensor set is closed: every channel the collector records is listed
//! once in the `sensors!` table below, together with its store id, wire key,
//! kind and display metadata. Everything else in the crate refers to
//! sensors through [`SensorId`] so an unknown channel can only enter through
//! [`SensorId::from_str`], where it is rejected.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

// ---

/// Value kind recorded for a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Numeric,
    Boolean,
    State,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SensorKind::Numeric => "numeric",
            SensorKind::Boolean => "boolean",
            SensorKind::State => "state",
        };
        f.write_str(s)
    }
}

/// Physical quantity of a numeric sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingType {
    None,
    Temperature,
    Percent,
    Current,
    Pressure,
    Time,
    Count,
}

/// Static metadata for one sensor.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SensorInfo {
    pub id: SensorId,
    /// Numeric id used as the `sensor` column in the store.
    pub db_id: i16,
    pub kind: SensorKind,
    pub reading_type: ReadingType,
    pub unit: &'static str,
    /// Decimal places for display.
    pub precision: u8,
    /// Human readable name as shown on the boiler's own display.
    pub name: &'static str,
}

impl SensorInfo {
    /// Monotonic counters (runtimes and start counts) that are subject to resets.
    pub fn is_counter(&self) -> bool {
        self.kind == SensorKind::Numeric
            && matches!(self.reading_type, ReadingType::Time | ReadingType::Count)
    }
}

macro_rules! sensors {
    ($( $variant:ident = $db_id:literal, $key:tt, $kind:ident, $rtype:ident, $unit:literal, $precision:literal, $name:literal; )+) => {
        /// Closed set of sensors recorded by the collector.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum SensorId {
            $( #[serde(rename = $key)] $variant, )+
        }

        impl SensorId {
            /// Every sensor, in catalogue order.
            pub const ALL: &'static [SensorId] = &[ $( SensorId::$variant, )+ ];

            pub fn info(self) -> SensorInfo {
                match self {
                    $( SensorId::$variant => SensorInfo {
                        id: SensorId::$variant,
                        db_id: $db_id,
                        kind: SensorKind::$kind,
                        reading_type: ReadingType::$rtype,
                        unit: $unit,
                        precision: $precision,
                        name: $name,
                    }, )+
                }
            }

            /// Stable snake_case key used in URLs and JSON.
            pub fn key(self) -> &'static str {
                match self {
                    $( SensorId::$variant => $key, )+
                }
            }
        }
    };
}

sensors! {
    BoilerTargetTemp      = 1,  "boiler_target_temp",       Numeric, Temperature, "°C",  0, "Kessel-Soll-Temperatur";
    BoilerActualTemp      = 2,  "boiler_actual_temp",       Numeric, Temperature, "°C",  1, "Kessel-Ist-Temperatur";
    HotWaterTargetTemp    = 3,  "hot_water_target_temp",    Numeric, Temperature, "°C",  0, "Warmwasser-Soll-Temperatur";
    HotWaterActualTemp    = 4,  "hot_water_actual_temp",    Numeric, Temperature, "°C",  1, "Warmwasser-Ist-Temperatur";
    FlowHk1TargetTemp     = 5,  "flow_hk1_target_temp",     Numeric, Temperature, "°C",  0, "Vorlauf HK1-Soll-Temperatur";
    FlowHk1ActualTemp     = 6,  "flow_hk1_actual_temp",     Numeric, Temperature, "°C",  1, "Vorlauf HK1-Ist-Temperatur";
    FlowHk2TargetTemp     = 7,  "flow_hk2_target_temp",     Numeric, Temperature, "°C",  0, "Vorlauf HK2-Soll-Temperatur";
    FlowHk2ActualTemp     = 8,  "flow_hk2_actual_temp",     Numeric, Temperature, "°C",  1, "Vorlauf HK2-Ist-Temperatur";
    MixerControl          = 9,  "mixer_control",            Numeric, None,        "",    0, "Mischersteuerung";
    ReturnTemp            = 10, "return_temp",              Numeric, Temperature, "°C",  1, "Rücklauftemperatur";
    OutdoorTemp           = 11, "outdoor_temp",             Numeric, Temperature, "°C",  1, "Außentemperatur";
    DampedOutdoorTemp     = 12, "damped_outdoor_temp",      Numeric, Temperature, "°C",  0, "Gedämpfte Außentemperatur";
    RoomTargetTemp        = 13, "room_target_temp",         Numeric, Temperature, "°C",  1, "Raum-Soll-Temperatur";
    RoomActualTemp        = 14, "room_actual_temp",         Numeric, Temperature, "°C",  1, "Raum-Ist-Temperatur";
    CurrentPower          = 15, "current_power",            Numeric, Percent,     "%",   0, "Momentane Leistung";
    MaxPower              = 16, "max_power",                Numeric, Percent,     "%",   0, "Maximale Leistung";
    FlameCurrent          = 17, "flame_current",            Numeric, Current,     "µA",  1, "Flammenstrom";
    SystemPressure        = 18, "system_pressure",          Numeric, Pressure,    "bar", 1, "Systemdruck";
    OperatingTime         = 19, "operating_time",           Numeric, Time,        "min", 0, "Betriebszeit";
    BurnerStarts          = 20, "burner_starts",            Numeric, Count,       "",    0, "Brennerstarts";
    HotWaterPrepTime      = 21, "hot_water_prep_time",      Numeric, Time,        "min", 0, "Warmwasserbereitungszeit";
    HotWaterPreparations  = 22, "hot_water_preparations",   Numeric, Count,       "",    0, "Warmwasserbereitungen";
    HeatingTime           = 23, "heating_time",             Numeric, Time,        "min", 0, "Heizzeit";
    PumpModulation        = 24, "pump_modulation",          Numeric, Percent,     "%",   0, "Kesselpumpenmodulation";
    HeatExchangerTemp     = 25, "heat_exchanger_temp",      Numeric, Temperature, "°C",  1, "Temperatur Ausgang Waermetauscher";

    Flame                 = 100, "flame",                   Boolean, None, "", 0, "Flamme";
    Burner                = 101, "burner",                  Boolean, None, "", 0, "Brenner";
    Ignition              = 102, "ignition",                Boolean, None, "", 0, "Zündung";
    BoilerPump            = 103, "boiler_pump",             Boolean, None, "", 0, "Kessel-Pumpe";
    Hk1DayMode            = 104, "hk1_day_mode",            Boolean, None, "", 0, "HK1 Tagbetrieb";
    Hk2DayMode            = 105, "hk2_day_mode",            Boolean, None, "", 0, "HK2 Tagbetrieb";
    ThreeWayValveHotWater = 106, "three_way_valve_hot_water", Boolean, None, "", 0, "3-Wege-Ventil";
    Circulation           = 107, "circulation",             Boolean, None, "", 0, "Zirkulation";
    HotWaterPreparation   = 110, "hot_water_preparation",   Boolean, None, "", 0, "Warmwasserbereitung";
    HotWaterDayMode       = 112, "hot_water_day_mode",      Boolean, None, "", 0, "WW-Tagbetrieb";
    SummerMode            = 113, "summer_mode",             Boolean, None, "", 0, "Sommerbetrieb";
    HotWaterTempOk        = 114, "hot_water_temp_ok",       Boolean, None, "", 0, "Warmwassertemperatur OK";
    HotWaterPriority      = 115, "hot_water_priority",      Boolean, None, "", 0, "Warmwasservorrang";
    Hk1Pump               = 116, "hk1_pump",                Boolean, None, "", 0, "HK1 Pumpe";
    Hk2Pump               = 117, "hk2_pump",                Boolean, None, "", 0, "HK2 Pumpe";
    Hk1Holiday            = 118, "hk1_holiday",             Boolean, None, "", 0, "HK1 Ferien";
    Hk1Party              = 119, "hk1_party",               Boolean, None, "", 0, "HK1 Party";
    Hk2Holiday            = 120, "hk2_holiday",             Boolean, None, "", 0, "HK2 Ferien";
    Hk2Party              = 121, "hk2_party",               Boolean, None, "", 0, "HK2 Party";
    Hk1Automatic          = 122, "hk1_automatic",           Boolean, None, "", 0, "HK1 Automatikbetrieb";
    Hk2Automatic          = 123, "hk2_automatic",           Boolean, None, "", 0, "HK2 Automatikbetrieb";
    CirculationDayMode    = 124, "circulation_day_mode",    Boolean, None, "", 0, "Zirkulation-Tagbetrieb";

    ServiceCode           = 200, "service_code",            State, None, "", 0, "Servicecode";
    ErrorCode             = 201, "error_code",              State, None, "", 0, "Fehlercode";
}

impl SensorId {
    pub fn kind(self) -> SensorKind {
        self.info().kind
    }

    /// Look up a sensor by its store id.
    pub fn from_db_id(db_id: i16) -> Option<SensorId> {
        SensorId::ALL
            .iter()
            .copied()
            .find(|s| s.info().db_id == db_id)
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SensorId {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorId::ALL
            .iter()
            .copied()
            .find(|sensor| sensor.key() == s)
            .ok_or_else(|| QueryError::UnknownSensorKey(s.to_string()))
    }
}

// ---

/// A single recorded value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Boolean(bool),
    Numeric(f64),
    State(String),
}

impl SensorValue {
    pub fn kind(&self) -> SensorKind {
        match self {
            SensorValue::Boolean(_) => SensorKind::Boolean,
            SensorValue::Numeric(_) => SensorKind::Numeric,
            SensorValue::State(_) => SensorKind::State,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SensorValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

/// A reading as persisted in the store. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub sensor: SensorId,
    pub timestamp: DateTime<Utc>,
    pub value: SensorValue,
}

/// Reading as posted by the collector, before validation.
#[derive(Debug, Deserialize)]
pub struct RawSensorReading {
    pub sensor: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub value: SensorValue,
}

impl RawSensorReading {
    /// Resolve the sensor key and check the value kind.
    ///
    /// Readings without a timestamp are stamped with `now`.
    pub fn to_reading(&self, now: DateTime<Utc>) -> Result<SensorReading, QueryError> {
        // ---
        let sensor: SensorId = self.sensor.parse()?;
        let expected = sensor.kind();

        if self.value.kind() != expected {
            return Err(QueryError::ValueKindMismatch { sensor, expected });
        }

        Ok(SensorReading {
            sensor,
            timestamp: self.timestamp.unwrap_or(now),
            value: self.value.clone(),
        })
    }
}
