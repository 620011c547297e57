use distrun_lib::platform::SUPPORTED;

/// Print one supported platform per line, in matrix order.
pub fn cmd_platforms() {
  for platform in SUPPORTED {
    println!("{}", platform);
  }
}
