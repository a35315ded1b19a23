pub trait Configuration: Clone + Send + Sync + 'static {
    fn host(&self) -> String;
    fn port(&self) -> String;
    fn default_slot_length_minutes(&self) -> i64;
    fn example_data(&self) -> bool;
}
