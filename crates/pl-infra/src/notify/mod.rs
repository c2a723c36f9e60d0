mod coalescer;

pub use coalescer::NotificationPipe;
