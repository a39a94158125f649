//! GPS/network time conversions for `DeviceTimeAns` and beacon payloads.

/// GPS epoch offset from the Unix epoch (seconds).
pub const GPS_EPOCH_OFFSET: u32 = 315_964_800;

/// Convert a GPS-epoch second count (as carried by `DeviceTimeAns`/the beacon
/// frame) to a Unix-epoch second count.
pub fn gps_to_network_time(gps_time: u32) -> u32 {
    gps_time.wrapping_add(GPS_EPOCH_OFFSET)
}

/// Convert a Unix-epoch second count to a GPS-epoch second count.
pub fn network_to_gps_time(network_time: u32) -> u32 {
    network_time.wrapping_sub(GPS_EPOCH_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_conversion() {
        let gps_time = 1_234_567_890;
        let network_time = gps_to_network_time(gps_time);
        assert_eq!(network_to_gps_time(network_time), gps_time);
    }
}
