//! Maxim DS3231 real-time clock over blocking I2C.
//!
//! Alarm 1 is configured to match every second and drives the active-low
//! `INT/SQW` output, which is wired to the tick GPIO line. The clock keeps UTC.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use embedded_hal::i2c::I2c;

use super::RtcPeripheral;
use crate::error::ClockFault;

// ---

pub const DEFAULT_ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
const REG_ALARM1_SECONDS: u8 = 0x07;
const REG_CONTROL: u8 = 0x0E;
const REG_STATUS: u8 = 0x0F;

const ALARM_MASK: u8 = 0x80;
const CONTROL_INTCN: u8 = 0x04;
const CONTROL_A1IE: u8 = 0x01;
const STATUS_OSF: u8 = 0x80;
const STATUS_A2F: u8 = 0x02;
const STATUS_A1F: u8 = 0x01;

const HOUR_12H: u8 = 0x40;
const HOUR_PM: u8 = 0x20;
const MONTH_CENTURY: u8 = 0x80;

pub struct Ds3231<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> Ds3231<I2C> {
    // ---
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Set the clock and clear the oscillator-stop flag.
    pub fn set_time(&mut self, time: DateTime<Utc>) -> Result<(), ClockFault> {
        // ---
        let year = time.year();
        if !(2000..2200).contains(&year) {
            return Err(ClockFault::InvalidTime(format!("year {year} out of RTC range")));
        }
        let century = if year >= 2100 { MONTH_CENTURY } else { 0 };
        let frame = [
            REG_SECONDS,
            to_bcd(time.second() as u8),
            to_bcd(time.minute() as u8),
            to_bcd(time.hour() as u8),
            time.weekday().number_from_sunday() as u8,
            to_bcd(time.day() as u8),
            to_bcd(time.month() as u8) | century,
            to_bcd((year % 100) as u8),
        ];
        self.write(&frame)?;

        let status = self.read_register(REG_STATUS)?;
        self.write(&[REG_STATUS, status & !STATUS_OSF])
    }

    fn read_register(&mut self, register: u8) -> Result<u8, ClockFault> {
        // ---
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(bus_fault)?;
        Ok(buf[0])
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ClockFault> {
        self.i2c.write(self.address, bytes).map_err(bus_fault)
    }
}

impl<I2C: I2c + Send> RtcPeripheral for Ds3231<I2C> {
    fn init(&mut self) -> Result<(), ClockFault> {
        // ---
        let status = self.read_register(REG_STATUS)?;
        if status & STATUS_OSF != 0 {
            tracing::warn!("DS3231 oscillator-stop flag set, time must be set before use");
        }
        self.write(&[REG_STATUS, status & !(STATUS_A1F | STATUS_A2F)])
    }

    fn arm_every_second(&mut self) -> Result<(), ClockFault> {
        // ---
        // A1M1..A1M4 all set: alarm once per second
        self.write(&[
            REG_ALARM1_SECONDS,
            ALARM_MASK,
            ALARM_MASK,
            ALARM_MASK,
            ALARM_MASK,
        ])?;
        let control = self.read_register(REG_CONTROL)?;
        self.write(&[REG_CONTROL, control | CONTROL_INTCN | CONTROL_A1IE])
    }

    fn clear_alarm_flag(&mut self) -> Result<(), ClockFault> {
        // ---
        let status = self.read_register(REG_STATUS)?;
        self.write(&[REG_STATUS, status & !STATUS_A1F])
    }

    fn now(&mut self) -> Result<DateTime<Utc>, ClockFault> {
        // ---
        if self.read_register(REG_STATUS)? & STATUS_OSF != 0 {
            return Err(ClockFault::InvalidTime(
                "oscillator stopped, time not trustworthy".into(),
            ));
        }

        let mut raw = [0u8; 7];
        self.i2c
            .write_read(self.address, &[REG_SECONDS], &mut raw)
            .map_err(bus_fault)?;
        decode_time(&raw)
    }
}

fn decode_time(raw: &[u8; 7]) -> Result<DateTime<Utc>, ClockFault> {
    // ---
    let second = from_bcd(raw[0] & 0x7F);
    let minute = from_bcd(raw[1] & 0x7F);
    let hour = if raw[2] & HOUR_12H != 0 {
        let h12 = from_bcd(raw[2] & 0x1F) % 12;
        if raw[2] & HOUR_PM != 0 {
            h12 + 12
        } else {
            h12
        }
    } else {
        from_bcd(raw[2] & 0x3F)
    };
    let day = from_bcd(raw[4] & 0x3F);
    let month = from_bcd(raw[5] & 0x1F);
    let century = if raw[5] & MONTH_CENTURY != 0 { 2100 } else { 2000 };
    let year = century + i32::from(from_bcd(raw[6]));

    NaiveDate::from_ymd_opt(year, month.into(), day.into())
        .and_then(|d| d.and_hms_opt(hour.into(), minute.into(), second.into()))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            ClockFault::InvalidTime(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            ))
        })
}

fn bus_fault<E: embedded_hal::i2c::Error>(e: E) -> ClockFault {
    ClockFault::Bus(format!("{:?}", e.kind()))
}

fn to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

fn from_bcd(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}
