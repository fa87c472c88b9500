use super::*;
use parking_lot::Mutex;

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: log.clone(),
        })
    }

    fn record(&self, value: u32) {
        self.log.lock().push(format!("{}:{}", self.name, value));
    }

    fn echo(&self, value: u32) -> u32 {
        value
    }
}

type OnValue = fn(u32);

#[test]
fn test_method_binding_calls_receiver() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder::new("a", &log);

    let binding = Binding::<OnValue>::method(&recorder, Recorder::record);
    assert!(!binding.is_static());
    assert_eq!(binding.call((7,)), Some(()));
    assert_eq!(*log.lock(), vec!["a:7"]);
}

#[test]
fn test_function_binding_is_static() {
    let binding = Binding::<fn(u32) -> u32>::function(|value: u32| value + 1);
    assert!(binding.is_static());
    assert!(binding.receiver().is_none());
    assert_eq!(binding.call((1,)), Some(2));
}

#[test]
fn test_same_method_shares_invoker_across_receivers() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = Recorder::new("a", &log);
    let b = Recorder::new("b", &log);

    let first = Binding::<OnValue>::method(&a, Recorder::record);
    let second = Binding::<OnValue>::method(&b, Recorder::record);

    assert_eq!(first.key(), second.key());
    assert!(Arc::ptr_eq(first.invoker(), second.invoker()));
    assert!(!first.same_target(&second));
    assert!(first.same_target(&first.clone()));
}

#[test]
fn test_tuple_form_bindings() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder::new("t", &log);

    let method = Binding::<OnValue>::from_method_fn(&recorder, |r: &Recorder, (v,)| r.record(v * 2));
    let function = Binding::<fn(u32) -> u32>::from_fn(|(v,)| v + 100);

    method.call((4,));
    assert_eq!(*log.lock(), vec!["t:8"]);
    assert_eq!(function.call((1,)), Some(101));
}

#[test]
fn test_capturing_closures_have_distinct_identities() {
    let offset = 3;
    let first = Binding::<fn(u32) -> u32>::function(move |v: u32| v + offset);
    let second = Binding::<fn(u32) -> u32>::function(move |v: u32| v + offset);

    assert!(!first.same_target(&second));
    assert!(first.same_target(&first.clone()));
}

#[test]
fn test_delegate_invokes_in_order_and_returns_last() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = Recorder::new("a", &log);
    let b = Recorder::new("b", &log);

    let delegate = Delegate::<OnValue>::method(&a, Recorder::record)
        + Delegate::<OnValue>::method(&b, Recorder::record)
        + Binding::<OnValue>::method(&a, Recorder::record);

    assert_eq!(delegate.len(), 3);
    delegate.invoke((1,));
    assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:1"]);

    let echo = Delegate::<fn(u32) -> u32>::method(&a, Recorder::echo)
        + Delegate::<fn(u32) -> u32>::function(|v: u32| v * 3);
    assert_eq!(echo.invoke((5,)), Some(15));
}

#[test]
fn test_empty_delegate() {
    let delegate = Delegate::<fn() -> u8>::empty();
    assert!(delegate.is_empty());
    assert!(delegate.is_static());
    assert_eq!(delegate.invoke(()), None);
}

#[test]
fn test_delegate_remove_takes_last_match_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = Recorder::new("a", &log);
    let b = Recorder::new("b", &log);

    let a_record = Delegate::<OnValue>::method(&a, Recorder::record);
    let mut delegate = a_record.clone() + Delegate::<OnValue>::method(&b, Recorder::record) + a_record.clone();

    assert_eq!(delegate.remove(&a_record), 1);
    assert_eq!(delegate.len(), 2);
    delegate.invoke((2,));
    assert_eq!(*log.lock(), vec!["a:2", "b:2"]);

    let unrelated = Delegate::<OnValue>::function(|_: u32| {});
    assert_eq!(delegate.remove(&unrelated), 0);
}

#[test]
fn test_is_static_requires_every_binding_to_be_static() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let a = Recorder::new("a", &log);

    let statics = Delegate::<OnValue>::function(|_: u32| {}) + Delegate::<OnValue>::function(|_: u32| {});
    assert!(statics.is_static());

    let mixed = statics + Delegate::<OnValue>::method(&a, Recorder::record);
    assert!(!mixed.is_static());
}

crate::shape!(Amount(cents: u32) -> u32);

#[test]
fn test_adapt_to_compatible_shape() {
    let binding = Binding::<fn(u32) -> u32>::function(|v: u32| v + 1);
    let adapted: Binding<Amount> = binding.adapt().unwrap();
    assert_eq!(adapted.call((41,)), Some(42));
    assert_eq!(adapted.key(), binding.key());

    let wrong = Binding::<fn(u64) -> u32>::function(|v: u64| v as u32);
    assert!(wrong.adapt::<Amount>().is_err());
}
