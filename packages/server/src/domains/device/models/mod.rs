pub mod device_record;

pub use device_record::DeviceRecord;
