//! 链路层 CRC 计算。

/// Modbus RTU CRC-16（初值 0xFFFF，反射多项式 0xA001）。
///
/// 帧上按低字节在前发送。
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = 0xFFFFu16;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// DNP3 链路层 CRC（CRC-16/DNP：多项式 0x3D65 反射为 0xA6BC，初值 0，结果取反）。
///
/// 帧上按低字节在前发送。
pub fn crc16_dnp(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA6BC;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}
