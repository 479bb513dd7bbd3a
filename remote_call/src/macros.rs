// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The declaration surface: `remote_functions!`, `remote_interface!`, and
//! `remote_class!`.
//!
//! Each declared parameter is classified at expansion time: `&mut T` is an
//! in-out parameter (marshalled out, then back into the caller's slot),
//! anything else is input-only. A declaration with no return type and no
//! in-out parameter is eligible for fire-and-forget delivery; everything
//! else is request/reply. Because the generated constructors and the
//! generated registration functions are typed from the same declaration,
//! arity or type drift between a call site and an implementation is a
//! compile error, not a wire corruption.

/// Declare remote functions.
///
/// ```ignore
/// remote_call::remote_functions! {
///     fn Append(s: &mut String, c: char) -> i32;
///     fn Notify(text: String);
/// }
/// ```
///
/// Each declaration expands to a unit struct of the same name with two
/// associated functions: `args(..)`, which builds the client-side call
/// descriptor, and `register(f)`, which installs a server-side
/// implementation whose signature is pinned to the declaration.
#[macro_export]
macro_rules! remote_functions {
    () => {};

    ( $(#[$m:meta])* fn $name:ident ( $($params:tt)* ) -> $ret:ty ; $($rest:tt)* ) => {
        $crate::__remote_function! { @munch $name, ($ret), false,
            meta( $(#[$m])* ),
            ids('a __client __w __r __params __retval),
            args(), ftys(), push(), decl(), pass(), back(),
            ( $($params)* , )
        }
        $crate::remote_functions! { $($rest)* }
    };

    ( $(#[$m:meta])* fn $name:ident ( $($params:tt)* ) ; $($rest:tt)* ) => {
        $crate::__remote_function! { @munch $name, (()), true,
            meta( $(#[$m])* ),
            ids('a __client __w __r __params __retval),
            args(), ftys(), push(), decl(), pass(), back(),
            ( $($params)* , )
        }
        $crate::remote_functions! { $($rest)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_function {
    // In-out parameter: the caller must supply a live `&mut` slot, and the
    // reply is read back into it.
    ( @munch $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $cl:ident $w:ident $r:ident $ps:ident $rv:ident),
        args( $($args:tt)* ), ftys( $($ftys:tt)* ), push( $($push:tt)* ),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $p:ident : &mut $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_function! { @munch $name, ($ret), false,
            meta( $($m)* ),
            ids($lt $cl $w $r $ps $rv),
            args( $($args)* $p: &$lt mut $pt, ),
            ftys( $($ftys)* &mut $pt, ),
            push( $($push)* $ps.push($crate::Param::in_out($p)); ),
            decl( $($decl)* let mut $p: $pt = <$pt as $crate::WireRead>::deserialize($r)?; ),
            pass( $($pass)* &mut $p, ),
            back( <$pt as $crate::WireWrite>::serialize(&$p, $w); $($back)* ),
            ( $($rest)* )
        }
    };

    // Input parameter, taken by value.
    ( @munch $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $cl:ident $w:ident $r:ident $ps:ident $rv:ident),
        args( $($args:tt)* ), ftys( $($ftys:tt)* ), push( $($push:tt)* ),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $p:ident : $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_function! { @munch $name, ($ret), $oneway,
            meta( $($m)* ),
            ids($lt $cl $w $r $ps $rv),
            args( $($args)* $p: $pt, ),
            ftys( $($ftys)* $pt, ),
            push( $($push)* $ps.push($crate::Param::input($p)); ),
            decl( $($decl)* let $p: $pt = <$pt as $crate::WireRead>::deserialize($r)?; ),
            pass( $($pass)* $p, ),
            back( $($back)* ),
            ( $($rest)* )
        }
    };

    // All parameters classified; emit the declaration's surface.
    ( @munch $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $cl:ident $w:ident $r:ident $ps:ident $rv:ident),
        args( $($args:tt)* ), ftys( $($ftys:tt)* ), push( $($push:tt)* ),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $(,)* )
    ) => {
        $($m)*
        #[allow(non_camel_case_types)]
        pub struct $name;

        #[allow(dead_code)]
        impl $name {
            pub const NAME: &'static str = stringify!($name);

            /// Build the call descriptor for one invocation.
            #[allow(unused_mut)]
            pub fn args<$lt>( $($args)* ) -> $crate::Call<$lt, $ret> {
                let mut $ps: ::std::vec::Vec<$crate::Param<$lt>> = ::std::vec::Vec::new();
                $($push)*

                $crate::Call::function(Self::NAME, $ps, $oneway)
            }

            /// Install the server-side implementation. The function-pointer
            /// parameter is typed from the declaration, so an
            /// implementation with a drifted signature does not compile.
            pub fn register(f: fn( $($ftys)* ) -> $ret) {
                $crate::server::register_function(
                    Self::NAME,
                    move |$cl: &str,
                          $w: &mut $crate::Writer,
                          $r: &mut $crate::Reader<'_>|
                          -> ::std::result::Result<(), $crate::WireError> {
                        $($decl)*

                        let $rv: $ret = f($($pass)*);

                        <$ret as $crate::WireWrite>::serialize(&$rv, $w);
                        $crate::server::affinity::note_returned($cl, &$rv);

                        $($back)*

                        Ok(())
                    },
                );
            }
        }
    };
}

/// Declare a remote interface: the client-side proxy for a class of
/// server-side instances.
///
/// ```ignore
/// remote_call::remote_interface! {
///     pub interface ITest {
///         fn Method1(&self);
///         fn Method2(&self, s: &mut String, c: char) -> i32;
///     }
/// }
/// ```
///
/// The proxy carries the instance identifier and nothing else. It travels
/// as an object handle: functions may return it (the null handle decodes
/// as `None` through `Option`), and it may be passed as an input
/// parameter. `destroy()` builds the destruction opcode for the instance.
#[macro_export]
macro_rules! remote_interface {
    ( $(#[$m:meta])* $vis:vis interface $iface:ident { $($body:tt)* } ) => {
        $(#[$m])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        $vis struct $iface {
            instance: ::std::string::String,
        }

        #[allow(dead_code)]
        impl $iface {
            pub fn from_instance_id(instance: ::std::string::String) -> Self {
                Self { instance }
            }

            pub fn instance_id(&self) -> &str {
                &self.instance
            }

            /// Build the destruction opcode for this instance.
            pub fn destroy(self) -> $crate::Call<'static, ()> {
                $crate::Call::destruction(self.instance)
            }
        }

        impl $crate::WireWrite for $iface {
            const IS_HANDLE: bool = true;

            fn serialize(&self, w: &mut $crate::Writer) {
                <str as $crate::WireWrite>::serialize(&self.instance, w);
            }
        }

        impl $crate::WireRead for $iface {
            const IS_HANDLE: bool = true;

            fn deserialize(
                r: &mut $crate::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::WireError> {
                Ok(Self {
                    instance: <::std::string::String as $crate::WireRead>::deserialize(r)?,
                })
            }
        }

        impl $crate::WireWrite for ::std::option::Option<$iface> {
            const IS_HANDLE: bool = true;

            fn serialize(&self, w: &mut $crate::Writer) {
                match self {
                    Some(handle) => <$iface as $crate::WireWrite>::serialize(handle, w),
                    None => <str as $crate::WireWrite>::serialize("", w),
                }
            }
        }

        impl $crate::WireRead for ::std::option::Option<$iface> {
            const IS_HANDLE: bool = true;

            fn deserialize(
                r: &mut $crate::Reader<'_>,
            ) -> ::std::result::Result<Self, $crate::WireError> {
                let instance = <::std::string::String as $crate::WireRead>::deserialize(r)?;

                Ok(if instance.is_empty() {
                    None
                } else {
                    Some($iface::from_instance_id(instance))
                })
            }
        }

        $crate::__remote_interface_methods! { $iface; $($body)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_interface_methods {
    ( $iface:ident ; ) => {};

    ( $iface:ident ;
        $(#[$m:meta])* fn $name:ident ( &self $(, $($params:tt)*)? ) -> $ret:ty ;
        $($rest:tt)*
    ) => {
        $crate::__remote_method! { @munch $iface, $name, ($ret), false,
            meta( $(#[$m])* ),
            ids('a __params),
            args(), push(),
            ( $($($params)*)? , )
        }
        $crate::__remote_interface_methods! { $iface; $($rest)* }
    };

    ( $iface:ident ;
        $(#[$m:meta])* fn $name:ident ( &self $(, $($params:tt)*)? ) ;
        $($rest:tt)*
    ) => {
        $crate::__remote_method! { @munch $iface, $name, (()), true,
            meta( $(#[$m])* ),
            ids('a __params),
            args(), push(),
            ( $($($params)*)? , )
        }
        $crate::__remote_interface_methods! { $iface; $($rest)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_method {
    ( @munch $iface:ident, $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $ps:ident),
        args( $($args:tt)* ), push( $($push:tt)* ),
        ( $p:ident : &mut $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_method! { @munch $iface, $name, ($ret), false,
            meta( $($m)* ),
            ids($lt $ps),
            args( $($args)* $p: &$lt mut $pt, ),
            push( $($push)* $ps.push($crate::Param::in_out($p)); ),
            ( $($rest)* )
        }
    };

    ( @munch $iface:ident, $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $ps:ident),
        args( $($args:tt)* ), push( $($push:tt)* ),
        ( $p:ident : $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_method! { @munch $iface, $name, ($ret), $oneway,
            meta( $($m)* ),
            ids($lt $ps),
            args( $($args)* $p: $pt, ),
            push( $($push)* $ps.push($crate::Param::input($p)); ),
            ( $($rest)* )
        }
    };

    ( @munch $iface:ident, $name:ident, ($ret:ty), $oneway:tt,
        meta( $($m:tt)* ),
        ids($lt:lifetime $ps:ident),
        args( $($args:tt)* ), push( $($push:tt)* ),
        ( $(,)* )
    ) => {
        #[allow(dead_code)]
        impl $iface {
            $($m)*
            #[allow(non_snake_case, unused_mut)]
            pub fn $name<$lt>(&self, $($args)*) -> $crate::Call<$lt, $ret> {
                let mut $ps: ::std::vec::Vec<$crate::Param<$lt>> = ::std::vec::Vec::new();
                $($push)*

                $crate::Call::method(
                    self.instance.clone(),
                    stringify!($name),
                    $ps,
                    $oneway,
                )
            }
        }
    };
}

/// Implement a remote interface for a server-side class.
///
/// ```ignore
/// #[derive(Default)]
/// struct CTest {
///     counter: i32,
/// }
///
/// remote_call::remote_class! {
///     impl ITest for CTest {
///         fn Method1(&mut self) {
///             self.counter += 1;
///         }
///         fn Method2(&mut self, s: &mut String, c: char) -> i32 {
///             s.push(c);
///             self.counter += 1;
///             self.counter
///         }
///     }
/// }
/// ```
///
/// The methods become inherent methods on the class, and the class gains
/// `export()` / `export_reap_when_idle()`, which register a constructed
/// instance together with its method records in the live-instance table
/// and hand back the wire handle. An exported instance lives until the
/// destruction opcode arrives, or — when exported reap-when-idle — until
/// the reaper notices its owning client is gone.
#[macro_export]
macro_rules! remote_class {
    ( impl $iface:ident for $class:ident { $($body:tt)* } ) => {
        $crate::__remote_class_methods! { $class; $($body)* }

        #[allow(dead_code)]
        impl $class {
            /// Register this instance and hand back its wire handle.
            pub fn export(self) -> $iface {
                $crate::__remote_class_export!(self, $iface, $class, false, $($body)*)
            }

            /// Like `export`, but the instance is torn down once the
            /// client it was handed to is gone.
            pub fn export_reap_when_idle(self) -> $iface {
                $crate::__remote_class_export!(self, $iface, $class, true, $($body)*)
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_class_export {
    ( $this:expr, $iface:ident, $class:ident, $reap:tt, $($body:tt)* ) => {{
        let __meta = $crate::server::instances::InstanceMeta::new(stringify!($class), $reap);
        let __state = ::std::sync::Arc::new($crate::server::ObjectState::new($this));
        let mut __methods: ::std::collections::HashMap<&'static str, $crate::server::EntryPoint> =
            ::std::collections::HashMap::new();

        $crate::__remote_class_records! { ids(__methods __state __client __w __r __retval), $($body)* }

        $crate::server::instances::add(__meta.clone(), __methods);

        $iface::from_instance_id(__meta.id().to_string())
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_class_methods {
    ( $class:ident ; ) => {};

    ( $class:ident ;
        $(#[$m:meta])* fn $name:ident ( &mut $slf:ident $(, $($params:tt)*)? ) $(-> $ret:ty)? $body:block
        $($rest:tt)*
    ) => {
        impl $class {
            $(#[$m])*
            #[allow(non_snake_case)]
            pub fn $name(&mut $slf $(, $($params)*)? ) $(-> $ret)? $body
        }

        $crate::__remote_class_methods! { $class; $($rest)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_class_records {
    ( ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident), ) => {};

    ( ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident),
        $(#[$m:meta])* fn $name:ident ( &mut self $(, $($params:tt)*)? ) -> $ret:ty $body:block
        $($rest:tt)*
    ) => {
        $crate::__remote_class_record! { @munch $name, ($ret),
            ids($map $state $cl $w $r $rv),
            decl(), pass(), back(),
            ( $($($params)*)? , )
        }
        $crate::__remote_class_records! { ids($map $state $cl $w $r $rv), $($rest)* }
    };

    ( ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident),
        $(#[$m:meta])* fn $name:ident ( &mut self $(, $($params:tt)*)? ) $body:block
        $($rest:tt)*
    ) => {
        $crate::__remote_class_record! { @munch $name, (()),
            ids($map $state $cl $w $r $rv),
            decl(), pass(), back(),
            ( $($($params)*)? , )
        }
        $crate::__remote_class_records! { ids($map $state $cl $w $r $rv), $($rest)* }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __remote_class_record {
    ( @munch $name:ident, ($ret:ty),
        ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $p:ident : &mut $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_class_record! { @munch $name, ($ret),
            ids($map $state $cl $w $r $rv),
            decl( $($decl)* let mut $p: $pt = <$pt as $crate::WireRead>::deserialize($r)?; ),
            pass( $($pass)* &mut $p, ),
            back( <$pt as $crate::WireWrite>::serialize(&$p, $w); $($back)* ),
            ( $($rest)* )
        }
    };

    ( @munch $name:ident, ($ret:ty),
        ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $p:ident : $pt:ty , $($rest:tt)* )
    ) => {
        $crate::__remote_class_record! { @munch $name, ($ret),
            ids($map $state $cl $w $r $rv),
            decl( $($decl)* let $p: $pt = <$pt as $crate::WireRead>::deserialize($r)?; ),
            pass( $($pass)* $p, ),
            back( $($back)* ),
            ( $($rest)* )
        }
    };

    ( @munch $name:ident, ($ret:ty),
        ids($map:ident $state:ident $cl:ident $w:ident $r:ident $rv:ident),
        decl( $($decl:tt)* ), pass( $($pass:tt)* ), back( $($back:tt)* ),
        ( $(,)* )
    ) => {
        {
            let $state = ::std::sync::Arc::clone(&$state);
            let __entry: $crate::server::EntryPoint = ::std::sync::Arc::new(
                move |$cl: &str,
                      $w: &mut $crate::Writer,
                      $r: &mut $crate::Reader<'_>|
                      -> ::std::result::Result<(), $crate::WireError> {
                    $($decl)*

                    let $rv: $ret = $state.lock().$name($($pass)*);

                    <$ret as $crate::WireWrite>::serialize(&$rv, $w);
                    $crate::server::affinity::note_returned($cl, &$rv);

                    $($back)*

                    Ok(())
                },
            );

            $map.insert(stringify!($name), __entry);
        }
    };
}
