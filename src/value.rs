use std::{cell::RefCell, fmt, future::Future, pin::Pin, rc::Rc};

use crate::{
    ast::Stmt,
    diagnostics::Result,
    environment::EnvironmentRef,
};

/// Boxed future that is allowed to hold `Rc` state; everything runs on one thread.
pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

#[derive(Clone)]
pub struct Value(pub Rc<ValueKind>);

impl Value {
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(kind))
    }

    pub fn null() -> Self {
        Self::new(ValueKind::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ValueKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ValueKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ValueKind::String(value.into()))
    }

    pub fn array(values: Vec<Value>) -> Self {
        Self::new(ValueKind::Array(RefCell::new(values)))
    }

    pub fn is_null(&self) -> bool {
        matches!(&*self.0, ValueKind::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match &*self.0 {
            ValueKind::Null => false,
            ValueKind::Bool(b) => *b,
            ValueKind::Int(n) => *n != 0,
            ValueKind::Float(f) => *f != 0.0 && !f.is_nan(),
            ValueKind::String(s) => !s.is_empty(),
            ValueKind::Array(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            ValueKind::Null => "null",
            ValueKind::Bool(_) => "bool",
            ValueKind::Int(_) | ValueKind::Float(_) => "number",
            ValueKind::String(_) => "string",
            ValueKind::Array(_) => "array",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n as f64),
            ValueKind::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integral numbers only; `2.0` counts, `2.5` does not.
    pub fn as_index(&self) -> Option<i64> {
        match &*self.0 {
            ValueKind::Int(n) => Some(*n),
            ValueKind::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &*self.0 {
            ValueKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&RefCell<Vec<Value>>> {
        match &*self.0 {
            ValueKind::Array(values) => Some(values),
            _ => None,
        }
    }

    /// `==` semantics: numbers by value, arrays by identity, differing kinds unequal.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (&*self.0, &*other.0) {
            (ValueKind::Null, ValueKind::Null) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Int(_) | ValueKind::Float(_), ValueKind::Int(_) | ValueKind::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (ValueKind::String(a), ValueKind::String(b)) => a == b,
            (ValueKind::Array(_), ValueKind::Array(_)) => Rc::ptr_eq(&self.0, &other.0),
            _ => false,
        }
    }
}

impl Value {
    /// Shared formatter for `Display` and `Debug`. `seen` holds the arrays on
    /// the current path; an array met again renders as nothing (`Display`)
    /// or `[...]` (`Debug`).
    fn render(
        &self,
        f: &mut fmt::Formatter<'_>,
        seen: &mut Vec<*const ValueKind>,
        debug: bool,
    ) -> fmt::Result {
        match &*self.0 {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Bool(b) => write!(f, "{b}"),
            ValueKind::Int(n) => write!(f, "{n}"),
            ValueKind::Float(n) if debug => write!(f, "{n:?}"),
            ValueKind::Float(n) if n.is_infinite() => {
                if n.is_sign_negative() {
                    write!(f, "-Infinity")
                } else {
                    write!(f, "Infinity")
                }
            }
            ValueKind::Float(n) => write!(f, "{n}"),
            ValueKind::String(s) if debug => write!(f, "{s:?}"),
            ValueKind::String(s) => write!(f, "{s}"),
            ValueKind::Array(values) => {
                let ptr = Rc::as_ptr(&self.0);
                if seen.contains(&ptr) {
                    return if debug { write!(f, "[...]") } else { Ok(()) };
                }
                seen.push(ptr);
                if debug {
                    write!(f, "[")?;
                }
                for (idx, value) in values.borrow().iter().enumerate() {
                    if idx > 0 {
                        write!(f, "{}", if debug { ", " } else { "," })?;
                    }
                    if debug || !value.is_null() {
                        value.render(f, seen, debug)?;
                    }
                }
                if debug {
                    write!(f, "]")?;
                }
                seen.pop();
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new(), true)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &mut Vec::new(), false)
    }
}

pub enum ValueKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(RefCell<Vec<Value>>),
}

/// Anything the function table can hold.
#[derive(Clone)]
pub enum Callable {
    Native(NativeFunction),
    User(Rc<UserFunction>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Native(fun) => &fun.name,
            Callable::User(fun) => &fun.name,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(fun) => write!(f, "<native fn {}>", fun.name),
            Callable::User(fun) => write!(f, "<fn {}>", fun.name),
        }
    }
}

pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<[Stmt]>,
    /// Environment active where the function was defined.
    pub env: EnvironmentRef,
    pub is_async: bool,
}

pub type SyncCallback = Rc<dyn Fn(&[Value]) -> Result<Value>>;
pub type SuspendingCallback = Rc<dyn Fn(Vec<Value>) -> LocalFuture<'static, Result<Value>>>;

#[derive(Clone)]
pub enum NativeCallback {
    Sync(SyncCallback),
    Suspending(SuspendingCallback),
}

#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub callback: NativeCallback,
}

impl NativeFunction {
    pub fn sync(
        name: impl Into<String>,
        callback: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback: NativeCallback::Sync(Rc::new(callback)),
        }
    }

    pub fn suspending(
        name: impl Into<String>,
        callback: impl Fn(Vec<Value>) -> LocalFuture<'static, Result<Value>> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            callback: NativeCallback::Suspending(Rc::new(callback)),
        }
    }

    pub async fn call(&self, args: Vec<Value>) -> Result<Value> {
        match &self.callback {
            NativeCallback::Sync(callback) => callback(&args),
            NativeCallback::Suspending(callback) => callback(args).await,
        }
    }
}

/// Argument `idx`, or null when the caller passed fewer arguments.
pub fn arg(args: &[Value], idx: usize) -> Value {
    args.get(idx).cloned().unwrap_or_else(Value::null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_render_like_comma_lists() {
        let value = Value::array(vec![
            Value::int(1),
            Value::null(),
            Value::string("x"),
            Value::float(2.5),
        ]);
        assert_eq!(value.to_string(), "1,,x,2.5");
    }

    #[test]
    fn integral_floats_drop_fraction() {
        assert_eq!(Value::float(3.0).to_string(), "3");
        assert_eq!(Value::float(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn empty_array_is_truthy_empty_string_is_not() {
        assert!(Value::array(Vec::new()).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(!Value::float(f64::NAN).is_truthy());
        assert!(!Value::null().is_truthy());
    }

    #[test]
    fn equality_compares_arrays_by_identity() {
        let a = Value::array(vec![Value::int(1)]);
        let b = Value::array(vec![Value::int(1)]);
        assert!(a.loosely_equals(&a.clone()));
        assert!(!a.loosely_equals(&b));
        assert!(Value::int(2).loosely_equals(&Value::float(2.0)));
        assert!(!Value::int(1).loosely_equals(&Value::string("1")));
    }

    #[test]
    fn self_containing_arrays_render_without_recursing() {
        let outer = Value::array(vec![Value::int(1)]);
        outer
            .as_array()
            .unwrap()
            .borrow_mut()
            .push(outer.clone());
        assert_eq!(outer.to_string(), "1,");
        assert_eq!(format!("{outer:?}"), "[1, [...]]");

        let inner = Value::array(vec![Value::int(2)]);
        let twice = Value::array(vec![inner.clone(), inner]);
        assert_eq!(twice.to_string(), "2,2");
    }
}
