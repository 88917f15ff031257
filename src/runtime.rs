use std::{
    cell::RefCell,
    cmp::Ordering,
    io::{self, Write},
    path::PathBuf,
    rc::Rc,
};

use tracing::{debug, trace};

use crate::{
    ast::{BinaryOp, Expr, Literal, LoadTarget, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, ForgeError, Result},
    environment::{Environment, EnvironmentRef},
    loader::{FsModuleLoader, ModuleLoader, ModuleSource},
    parser,
    value::{Callable, LocalFuture, UserFunction, Value, ValueKind},
};

pub struct ExecutionContext {
    /// Directory that `load from <folder>` resolves folders against.
    pub module_root: PathBuf,
}

impl ExecutionContext {
    pub fn new(module_root: impl Into<PathBuf>) -> Self {
        Self {
            module_root: module_root.into(),
        }
    }

    pub fn current_dir() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(".")
    }
}

/// In-memory `print` sink; clones share the same buffer.
#[derive(Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    globals: EnvironmentRef,
    output: RefCell<Box<dyn Write>>,
    loader: Box<dyn ModuleLoader>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        let globals = Environment::new();
        crate::stdlib::install(&globals);
        let loader = FsModuleLoader::new(context.module_root.clone());
        Self {
            globals,
            output: RefCell::new(Box::new(io::stdout())),
            loader: Box::new(loader),
        }
    }

    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = RefCell::new(Box::new(output));
        self
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// The root environment; built-ins live in its function table.
    pub fn globals(&self) -> &EnvironmentRef {
        &self.globals
    }

    /// Parses and runs a whole program. Yields the value of a top-level
    /// `return`, or null.
    pub async fn run_source(&self, source: &str) -> Result<Value> {
        let statements = parser::parse_program(source)?;
        self.run(&statements).await
    }

    pub async fn run(&self, statements: &[Stmt]) -> Result<Value> {
        match self.execute_statements(statements, &self.globals).await? {
            FlowControl::Next => Ok(Value::null()),
            FlowControl::Return(value) => Ok(value),
        }
    }

    /// Invokes a function visible from the root environment.
    pub async fn call_function(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let callable = Environment::get_function(&self.globals, name)?;
        self.call(&callable, args).await
    }

    fn execute_statements<'a>(
        &'a self,
        statements: &'a [Stmt],
        env: &'a EnvironmentRef,
    ) -> LocalFuture<'a, Result<FlowControl>> {
        Box::pin(async move {
            for stmt in statements {
                let flow = self
                    .execute_statement(stmt, env)
                    .await
                    .map_err(|err| err.at_line(stmt.line))?;
                if let FlowControl::Return(value) = flow {
                    return Ok(FlowControl::Return(value));
                }
            }
            Ok(FlowControl::Next)
        })
    }

    async fn execute_block(&self, body: &[Stmt], env: &EnvironmentRef) -> Result<FlowControl> {
        let child = Environment::with_parent(Rc::clone(env));
        self.execute_statements(body, &child).await
    }

    async fn execute_statement(&self, stmt: &Stmt, env: &EnvironmentRef) -> Result<FlowControl> {
        trace!(line = stmt.line, kind = statement_label(&stmt.kind), "executing statement");
        match &stmt.kind {
            StmtKind::Function {
                name,
                params,
                body,
                is_async,
            } => {
                debug!(function = %name, params = params.len(), "defining function");
                let function = UserFunction {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::clone(body),
                    env: Rc::clone(env),
                    is_async: *is_async,
                };
                env.borrow_mut()
                    .define_function(name.clone(), Callable::User(Rc::new(function)));
                Ok(FlowControl::Next)
            }
            StmtKind::Await(call) | StmtKind::Call(call) => {
                self.call_named(&call.callee, &call.args, env).await?;
                Ok(FlowControl::Next)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.evaluate(expr, env).await?,
                    None => Value::null(),
                };
                Ok(FlowControl::Return(value))
            }
            StmtKind::If {
                branches,
                else_branch,
            } => {
                for branch in branches {
                    if self.evaluate(&branch.condition, env).await?.is_truthy() {
                        return self.execute_block(&branch.body, env).await;
                    }
                }
                match else_branch {
                    Some(body) => self.execute_block(body, env).await,
                    None => Ok(FlowControl::Next),
                }
            }
            StmtKind::For {
                binding,
                start,
                end,
                body,
            } => {
                let start = self.evaluate(start, env).await?;
                let end = self.evaluate(end, env).await?;
                self.execute_for(binding, &start, &end, body, env).await
            }
            StmtKind::While { condition, body } => {
                while self.evaluate(condition, env).await?.is_truthy() {
                    if let FlowControl::Return(value) = self.execute_block(body, env).await? {
                        return Ok(FlowControl::Return(value));
                    }
                }
                Ok(FlowControl::Next)
            }
            StmtKind::Print(args) => {
                let mut line = String::new();
                for arg in args {
                    let value = self.evaluate(arg, env).await?;
                    line.push_str(&value.to_string());
                }
                let mut output = self.output.borrow_mut();
                writeln!(output, "{line}")?;
                output.flush()?;
                Ok(FlowControl::Next)
            }
            StmtKind::Assign { name, value } => {
                let value = self.evaluate(value, env).await?;
                Environment::set(env, name, value);
                Ok(FlowControl::Next)
            }
            StmtKind::Load { folder, target } => {
                self.load(folder, target, env).await?;
                Ok(FlowControl::Next)
            }
        }
    }

    /// Counts from `start` to `end` inclusive. An int start counts on `i64`
    /// and stops at `i64::MAX`; a float start counts on `f64`.
    async fn execute_for(
        &self,
        binding: &str,
        start: &Value,
        end: &Value,
        body: &[Stmt],
        env: &EnvironmentRef,
    ) -> Result<FlowControl> {
        let (Some(first), Some(last)) = (start.as_number(), end.as_number()) else {
            return Err(ForgeError::from(Diagnostic::type_error(format!(
                "for: range bounds must be numbers, found {} and {}",
                start.type_name(),
                end.type_name()
            ))));
        };
        if let ValueKind::Int(first) = &*start.0 {
            let last = match &*end.0 {
                ValueKind::Int(last) => *last,
                _ if last.is_nan() => return Ok(FlowControl::Next),
                _ => last.floor() as i64,
            };
            let mut current = *first;
            while current <= last {
                Environment::set(env, binding, Value::int(current));
                if let FlowControl::Return(value) = self.execute_block(body, env).await? {
                    return Ok(FlowControl::Return(value));
                }
                match current.checked_add(1) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            return Ok(FlowControl::Next);
        }
        let mut current = first;
        while current <= last {
            Environment::set(env, binding, Value::float(current));
            if let FlowControl::Return(value) = self.execute_block(body, env).await? {
                return Ok(FlowControl::Return(value));
            }
            let next = current + 1.0;
            if next == current {
                break;
            }
            current = next;
        }
        Ok(FlowControl::Next)
    }

    async fn load(&self, folder: &str, target: &LoadTarget, env: &EnvironmentRef) -> Result<()> {
        for source in self.loader.resolve(folder, target)? {
            match source {
                ModuleSource::Script { path, statements } => {
                    debug!(module = %path.display(), "executing module");
                    // A `return` inside the module only ends the module.
                    self.execute_statements(&statements, env)
                        .await
                        .map_err(|err| err.with_note(format!("in module `{}`", path.display())))?;
                }
                ModuleSource::Native { name, module } => {
                    debug!(
                        module = %name,
                        functions = module.functions.len(),
                        values = module.values.len(),
                        "merging native module"
                    );
                    for function in module.functions {
                        env.borrow_mut()
                            .define_function(function.name.clone(), Callable::Native(function));
                    }
                    for (key, value) in module.values {
                        Environment::set(env, &key, value);
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate<'a>(&'a self, expr: &'a Expr, env: &'a EnvironmentRef) -> LocalFuture<'a, Result<Value>> {
        Box::pin(async move {
            match expr {
                Expr::Literal(lit) => Ok(literal(lit)),
                Expr::Identifier(name) => Environment::get(env, name),
                Expr::Binary {
                    op: op @ (BinaryOp::And | BinaryOp::Or),
                    left,
                    right,
                } => {
                    let left = self.evaluate(left, env).await?;
                    let decided = match op {
                        BinaryOp::And => !left.is_truthy(),
                        _ => left.is_truthy(),
                    };
                    if decided {
                        Ok(left)
                    } else {
                        self.evaluate(right, env).await
                    }
                }
                Expr::Binary { op, left, right } => {
                    let left = self.evaluate(left, env).await?;
                    let right = self.evaluate(right, env).await?;
                    binary(*op, &left, &right)
                }
                Expr::Unary { op, expr } => {
                    let value = self.evaluate(expr, env).await?;
                    unary(*op, &value)
                }
                Expr::Call { callee, args } => self.call_named(callee, args, env).await,
                Expr::Index { target, index } => {
                    let target = self.evaluate(target, env).await?;
                    let index = self.evaluate(index, env).await?;
                    index_value(&target, &index)
                }
                Expr::Group(inner) | Expr::Await(inner) => self.evaluate(inner, env).await,
            }
        })
    }

    async fn call_named(&self, callee: &str, args: &[Expr], env: &EnvironmentRef) -> Result<Value> {
        let callable = Environment::get_function(env, callee)?;
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg, env).await?);
        }
        self.call(&callable, values).await
    }

    async fn call(&self, callable: &Callable, args: Vec<Value>) -> Result<Value> {
        match callable {
            Callable::Native(fun) => fun.call(args).await,
            Callable::User(fun) => {
                trace!(
                    function = %fun.name,
                    args = args.len(),
                    is_async = fun.is_async,
                    "invoking function"
                );
                let local = Environment::with_parent(Rc::clone(&fun.env));
                {
                    let mut scope = local.borrow_mut();
                    let mut args = args.into_iter();
                    for param in &fun.params {
                        scope.define(param.clone(), args.next().unwrap_or_else(Value::null));
                    }
                }
                match self.execute_statements(&fun.body, &local).await? {
                    FlowControl::Return(value) => Ok(value),
                    FlowControl::Next => Ok(Value::null()),
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

enum FlowControl {
    Next,
    Return(Value),
}

fn statement_label(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Function { .. } => "function",
        StmtKind::Await(_) => "await",
        StmtKind::Return(_) => "return",
        StmtKind::If { .. } => "if",
        StmtKind::For { .. } => "for",
        StmtKind::While { .. } => "while",
        StmtKind::Print(_) => "print",
        StmtKind::Assign { .. } => "assign",
        StmtKind::Call(_) => "call",
        StmtKind::Load { .. } => "load",
    }
}

fn literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => add(left, right),
        Sub => arithmetic(op, left, right, i64::checked_sub, |a, b| a - b),
        Mul => arithmetic(op, left, right, i64::checked_mul, |a, b| a * b),
        Div => divide(left, right),
        Mod => {
            ensure_nonzero(right, "modulo by zero")?;
            arithmetic(op, left, right, i64::checked_rem, |a, b| a % b)
        }
        Equal => Ok(Value::bool(left.loosely_equals(right))),
        NotEqual => Ok(Value::bool(!left.loosely_equals(right))),
        Less => compare(op, left, right, Ordering::is_lt),
        LessEqual => compare(op, left, right, Ordering::is_le),
        Greater => compare(op, left, right, Ordering::is_gt),
        GreaterEqual => compare(op, left, right, Ordering::is_ge),
        And => Ok(if left.is_truthy() { right.clone() } else { left.clone() }),
        Or => Ok(if left.is_truthy() { left.clone() } else { right.clone() }),
    }
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    if left.as_str().is_some() || right.as_str().is_some() {
        return Ok(Value::string(format!("{left}{right}")));
    }
    arithmetic(BinaryOp::Add, left, right, i64::checked_add, |a, b| a + b)
}

fn arithmetic(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    match (&*left.0, &*right.0) {
        (ValueKind::Int(a), ValueKind::Int(b)) => int_op(*a, *b).map(Value::int).ok_or_else(|| {
            ForgeError::from(Diagnostic::evaluation(format!(
                "integer overflow in `{}`",
                op.symbol()
            )))
        }),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(Value::float(float_op(a, b))),
            _ => Err(operand_error(op, left, right)),
        },
    }
}

fn divide(left: &Value, right: &Value) -> Result<Value> {
    ensure_nonzero(right, "division by zero")?;
    match (&*left.0, &*right.0) {
        (ValueKind::Int(a), ValueKind::Int(b)) if a.checked_rem(*b) == Some(0) => {
            a.checked_div(*b).map(Value::int).ok_or_else(|| {
                ForgeError::from(Diagnostic::evaluation("integer overflow in `/`"))
            })
        }
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => Ok(Value::float(a / b)),
            _ => Err(operand_error(BinaryOp::Div, left, right)),
        },
    }
}

fn ensure_nonzero(divisor: &Value, message: &str) -> Result<()> {
    if divisor.as_number() == Some(0.0) {
        return Err(ForgeError::from(Diagnostic::evaluation(message)));
    }
    Ok(())
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    accept: fn(Ordering) -> bool,
) -> Result<Value> {
    let ordering = match (left.as_str(), right.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => match (left.as_number(), right.as_number()) {
            // NaN compares false against everything.
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => return Err(operand_error(op, left, right)),
        },
    };
    Ok(Value::bool(ordering.is_some_and(accept)))
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match op {
        UnaryOp::Not => Ok(Value::bool(!value.is_truthy())),
        UnaryOp::Negate => match &*value.0 {
            ValueKind::Int(n) => n.checked_neg().map(Value::int).ok_or_else(|| {
                ForgeError::from(Diagnostic::evaluation("integer overflow in unary `-`"))
            }),
            ValueKind::Float(n) => Ok(Value::float(-n)),
            _ => Err(ForgeError::from(Diagnostic::type_error(format!(
                "unary `-` expects a number, found {}",
                value.type_name()
            )))),
        },
    }
}

fn index_value(target: &Value, index: &Value) -> Result<Value> {
    let Some(idx) = index.as_index() else {
        return Err(ForgeError::from(Diagnostic::type_error(format!(
            "index must be an integer, found {}",
            index.type_name()
        ))));
    };
    let Ok(idx) = usize::try_from(idx) else {
        return Ok(Value::null());
    };
    match &*target.0 {
        ValueKind::Array(values) => Ok(values.borrow().get(idx).cloned().unwrap_or_else(Value::null)),
        ValueKind::String(text) => Ok(text
            .chars()
            .nth(idx)
            .map(|ch| Value::string(ch.to_string()))
            .unwrap_or_else(Value::null)),
        _ => Err(ForgeError::from(Diagnostic::type_error(format!(
            "cannot index into {}",
            target.type_name()
        )))),
    }
}

fn operand_error(op: BinaryOp, left: &Value, right: &Value) -> ForgeError {
    ForgeError::from(Diagnostic::type_error(format!(
        "unsupported operand types for `{}`: {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    )))
}
