/// Returns the time since UNIX_EPOCH in seconds, per the system clock.
pub fn system_time_secs() -> i64 {
    let now = std::time::SystemTime::now();
    now.duration_since(std::time::UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

#[cfg(not(test))]
pub fn valkey_current_time_secs() -> i64 {
    use valkey_module::RedisModule_Milliseconds;
    unsafe { RedisModule_Milliseconds.unwrap()() / 1000 }
}

/// Wall clock used for automatic timestamps (`TS.ADD key * v`, TS.INCRBY).
/// Resolves through the server's cached clock inside the module, and through
/// the system clock in unit tests where no server is running.
pub fn current_time_secs() -> i64 {
    cfg_if::cfg_if! {
        if #[cfg(test)] {
            system_time_secs()
        } else {
            valkey_current_time_secs()
        }
    }
}
