use crate::Value;

pub trait Appendable {
    fn append_str(&mut self, s: &str);
    fn append_i64(&mut self, i: i64);
    fn append_f64(&mut self, f: f64);
    fn append_bool(&mut self, b: bool);
    fn append_value(&mut self, v: &Value);
}

impl Appendable for String {
    fn append_str(&mut self, s: &str) {
        self.push_str(s);
    }
    fn append_i64(&mut self, i: i64) {
        let mut buf = itoa::Buffer::new();
        self.push_str(buf.format(i));
    }
    fn append_f64(&mut self, f: f64) {
        if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
            self.append_i64(f as i64);
        } else {
            let mut buf = ryu::Buffer::new();
            self.push_str(buf.format(f));
        }
    }
    fn append_bool(&mut self, b: bool) {
        self.push_str(if b { "true" } else { "false" });
    }
    fn append_value(&mut self, v: &Value) {
        match v {
            Value::Int(i) => self.append_i64(*i),
            Value::Float(f) => self.append_f64(*f),
            Value::Bool(b) => self.append_bool(*b),
            Value::Str(s) => self.append_str(s),
            Value::List(l) => {
                use std::fmt::Write;
                write!(self, "{l}").ok();
            }
            Value::DivertTarget(p) => {
                use std::fmt::Write;
                write!(self, "{p}").ok();
            }
            Value::VariablePointer { name, .. } => self.append_str(name),
            Value::Void => {}
        }
    }
}
